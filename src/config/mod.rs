pub mod agent;
pub mod ingestion;
pub mod redis;
pub mod settings;
