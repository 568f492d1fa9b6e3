//! Device-side half of the pipeline: queue readings locally, upload them in
//! signed batches, and keep a link to the provisioned wearable.

pub mod credentials;
pub mod discovery;
pub mod queue;
pub mod sync;
pub mod transport;
