// src/lib.rs
//
// Library entry point for chip-sync.
// Re-exports modules needed by the binary and integration tests.

pub mod api;
pub mod cfg;
pub mod cli;
pub mod client_ops;
pub mod error;
pub mod files;
pub mod ingest;
pub mod labeler;
pub mod message;
pub mod oauth2;
pub mod reconcile;
pub mod records;
pub mod request;
pub mod state_writer;
pub mod uploader;
pub mod utils;
pub mod webdriver;

// Re-export Clock trait for easy access
pub use client_ops::{Clock, RealClock};
