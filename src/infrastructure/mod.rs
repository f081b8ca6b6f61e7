//! Infrastructure layer
//!
//! External collaborators and their abstractions: the shared coordination
//! store and the HTTP clients for both upstream processors.

pub mod http_client;
pub mod redis_client;
