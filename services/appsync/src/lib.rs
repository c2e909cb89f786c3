//! App registry service library crate.
//!
//! # Purpose
//! Exposes the HTTP API, App registry, broker command channel, configuration,
//! and storage implementations for use by the binary and tests.
//!
//! # Notes
//! Broker-side access control is delegated to `iotgate_dynsec`; this crate
//! owns the App records and the ordering between broker commands and store
//! updates.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod mqtt;
pub mod observability;
pub mod registry;
pub mod store;
