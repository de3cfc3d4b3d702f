//! Business logic services.

pub mod artifact_service;
pub mod audit_service;
pub mod auth_service;
pub mod bulk_service;
pub mod matrix_service;
pub mod naming;
pub mod taxonomy_service;
