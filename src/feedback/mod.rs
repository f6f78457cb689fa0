//! Evaluation of assistant turns.
//!
//! The [`recorder::Recorder`] wraps an engine call and produces a
//! [`record::Record`]. Each [`definition::FeedbackDefinition`] selects
//! arguments from the record, scores them through the
//! [`provider::FeedbackProvider`] in a background task and settles its result
//! on the record.

pub mod definition;
pub mod provider;
pub mod record;
pub mod recorder;
