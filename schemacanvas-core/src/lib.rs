pub mod auth;
pub mod common;
pub mod config;
pub mod errors;
pub mod graph_patch;
pub mod graph_types;

pub mod app_context;
pub use app_context::AppContext;
pub mod database;
pub mod services;
