pub mod bm25;
pub mod hybrid;
pub mod index;
pub mod vector;
