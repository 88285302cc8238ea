pub mod ingest;
pub mod scheduler;

pub use ingest::{process_source, IngestOutcome, IngestReport};
pub use scheduler::Scheduler;
