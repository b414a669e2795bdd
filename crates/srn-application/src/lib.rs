//! Application layer for SRN.
//!
//! This crate provides the migration engine and the boundary service that
//! coordinate between the domain and infrastructure layers.

pub mod migration_engine;
pub mod scope_service;

pub use migration_engine::MigrationEngine;
pub use scope_service::{
    AddressView, ErrorResponse, JobStatusResponse, MigrationRequest, MigrationValidation,
    ParsedSrn, ScopeService,
};
