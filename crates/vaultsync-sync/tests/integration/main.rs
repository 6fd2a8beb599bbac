//! Integration tests for vaultsync-sync
//!
//! Drive a connected vault and the command executor against in-memory
//! metadata, blob and filesystem fakes with deterministic failure injection.

mod common;

mod test_batch;
mod test_lifecycle;
mod test_scenarios;
