//! # docs-chat
//!
//! A chat service over a documentation corpus. Answers come from a
//! retrieval-augmented pipeline, and every answer is recorded and graded in
//! the background for groundedness, answer relevance and context relevance.
//!
//! ## Architecture
//!
//! ```text
//!      ┌──────────────┐
//!      │  User Prompt │
//!      └──────┬───────┘
//!             │ appended to session transcript
//!             ▼
//!   ┌───────────────────┐      first turn or query mode: prompt as-is
//!   │  Condense (LLM)   │◄──── later turns: prompt + chat history
//!   └─────────┬─────────┘
//!             │ standalone question
//!             ▼
//!   ┌───────────────────┐
//!   │  BM25 + Vector    │      fetch_k candidates per list
//!   │  RRF Fusion       │      keep top_k
//!   └─────────┬─────────┘
//!             │ context chunks
//!             ▼
//!   ┌───────────────────┐
//!   │ Synthesize (LLM)  │
//!   └─────────┬─────────┘
//!             │ answer + trace
//!             ▼
//!   ┌───────────────────┐      one background task per feedback:
//!   │     Record        │────► Groundedness      (per sentence, mean)
//!   │  (watch channel)  │────► Answer Relevance  (one call)
//!   └─────────┬─────────┘────► Context Relevance (per chunk, mean)
//!             │
//!             ▼
//!   ┌───────────────────┐
//!   │ Pills: polled or  │      "{name} {score:.4}" + ✅ ⚠️ 🛑
//!   │ pushed over SSE   │
//!   └───────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, documents, LLM and feedback
//! - [`models`] - Transcript messages and wire types shared across modules
//! - [`loader`] - Recursive document loading with format detection
//! - [`chunking`] - Heading-aware Markdown chunking and paragraph fallback
//! - [`search`] - BM25 (tantivy), in-memory vectors, RRF fusion and the combined index
//! - [`llm`] - `ChatModel` / `Embedder` seams over Ollama or OpenAI-compatible APIs
//! - [`engine`] - Query engine (retrieve + synthesize) and condensing chat engine
//! - [`feedback`] - Records, feedback definitions, the grading provider and the recorder
//! - [`render`] - Feedback pills, detail tables and trace views
//! - [`session`] - Per-session transcript and turn handling
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state and memoized engine construction

pub mod api;
pub mod chunking;
pub mod config;
pub mod engine;
pub mod feedback;
pub mod llm;
pub mod loader;
pub mod models;
pub mod render;
pub mod search;
pub mod session;
pub mod state;
