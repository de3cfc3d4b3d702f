//! DocSparrow - Backend Library
//!
//! Sales-kit document portal: a country x product x category matrix of
//! versioned documents with bulk download and an audit trail.

#[macro_use]
mod macros;

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
