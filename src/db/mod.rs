pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::InMemoryIngestionStore;
pub use postgres::PgIngestionStore;
pub use store::{IngestionStore, StoreError};
