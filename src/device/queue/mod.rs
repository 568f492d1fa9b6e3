pub mod backend;
pub mod error;
pub mod local_queue;
pub mod memory;
pub mod sqlite;

pub use backend::QueueBackend;
pub use error::QueueError;
pub use local_queue::LocalQueue;
pub use memory::MemoryQueueBackend;
pub use sqlite::SqliteQueueBackend;
