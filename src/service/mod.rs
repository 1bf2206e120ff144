mod ingest;
mod stats;

pub use ingest::*;
pub use stats::*;
