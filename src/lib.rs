pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod session;
pub mod views;

pub use error::{AppError, Result};
