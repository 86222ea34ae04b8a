pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod observability;
pub mod state;
