pub mod config;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod state;

pub use models::*;
pub use state::AppState;
