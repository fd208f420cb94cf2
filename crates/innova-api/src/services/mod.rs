//! Background services.

pub mod jobs;

pub use jobs::{
    download_url, CancelOutcome, InMemoryJobRepository, JobReaper, JobRepository, JobRunner,
};
