//! Database models (SQLx).

pub mod artifact;
pub mod audit_log;
pub mod taxonomy;
pub mod user;
