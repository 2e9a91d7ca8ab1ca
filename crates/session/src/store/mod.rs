// Store and auth backends.
//
// `sqlite` is the durable backend used by the CLI; `memory` keeps everything
// in process and can be armed to fail specific calls.

pub mod db;
pub mod memory;
pub mod sqlite;

pub use memory::{MemoryAuth, MemoryStore, StoreOp};
pub use sqlite::{LocalAuth, SqliteStore};
