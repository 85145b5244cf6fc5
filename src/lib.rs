// src/lib.rs

pub mod answers;
pub mod attempts;
pub mod config;
pub mod delivery;
pub mod error;
pub mod grading;
pub mod handlers;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod utils;

// Re-export specific items for convenience if needed
pub use routes::create_router;
