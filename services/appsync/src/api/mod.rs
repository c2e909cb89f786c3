//! App sync HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules, the shared error mapping, and the OpenAPI
//! document.
pub mod apps;
pub mod error;
pub mod openapi;
pub mod system;
pub mod types;
