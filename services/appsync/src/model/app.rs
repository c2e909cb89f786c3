//! App record definitions.
//!
//! # Purpose
//! Defines the persisted App record and the password-free view returned by the
//! HTTP API.
use chrono::{DateTime, Utc};
use iotgate_dynsec::Password;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct App {
    pub app_id: String,
    pub password: Password,
    pub restricted: bool,
    pub created_date: DateTime<Utc>,
}

impl App {
    pub fn view(&self) -> AppView {
        AppView::from(self)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct AppView {
    pub app_id: String,
    pub restricted: bool,
    pub created_date: DateTime<Utc>,
}

impl From<&App> for AppView {
    fn from(app: &App) -> Self {
        Self {
            app_id: app.app_id.clone(),
            restricted: app.restricted,
            created_date: app.created_date,
        }
    }
}
