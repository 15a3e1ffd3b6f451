//! Store configuration audit library
//!
//! This module exports the core components for testing and integration.

pub mod audit;
pub mod bulk_load;
pub mod cli;
pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod types;
pub mod validators;
