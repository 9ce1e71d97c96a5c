pub mod cancel;
pub mod random_provider;
pub mod tracker;
pub mod workers;

pub use cancel::CancelToken;
pub use tracker::Tracker;
pub use workers::{Pending, WorkerPool};
