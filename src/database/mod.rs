// Database module
// JSON-persisted vector index for chunks, SQLite for conversation history

pub mod sqlite;
pub mod vector_index;

pub use sqlite::Database;
pub use vector_index::{IndexEntry, IndexStats, SearchHit, VectorIndex};
