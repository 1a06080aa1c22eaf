//! HTTP server and command line for the EDL.
//!
//! The binary is a thin wrapper around [`cli::run`]; everything is exposed
//! here so the integration tests can drive the real router.

pub mod cli;
pub mod config;
pub mod http;
pub mod persist;
pub mod report;
pub mod serve;
pub mod source;
