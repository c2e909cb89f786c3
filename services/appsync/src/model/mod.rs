//! App registry data model.
//!
//! # Purpose
//! Re-exports the App record and its public view used by the store and API
//! layers.
mod app;

pub use app::{App, AppView};
