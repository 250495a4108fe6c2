//! # bizval Common Library
//!
//! Shared code for the bizval function server and analysis worker:
//! - Database schema, records and queries
//! - Table-backed message queue
//! - Bearer token authentication helpers
//! - Configuration loading
//! - Valuation arithmetic (simulation, DCF) and business ID validation

pub mod api;
pub mod business_id;
pub mod config;
pub mod db;
pub mod dcf;
pub mod error;
pub mod queue;
pub mod simulation;

pub use business_id::is_valid_business_id;
pub use error::{Error, Result};
