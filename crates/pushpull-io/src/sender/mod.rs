//! Sending side: worker threads pushing numbered tasks

pub mod pool;
pub mod worker;

pub use pool::{create_worker_threads, wait_for_threads, PoolReport, WorkerHandle};
pub use worker::{Worker, WorkerReport, WorkerStatus};
