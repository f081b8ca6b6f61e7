//! Core selection and resilience services
//!
//! The dispatch engine: shared health view, distributed circuit breaking,
//! processor selection, the retrying dispatcher and the summary counters.

pub mod circuit_breaker;
pub mod health_service;
pub mod payment_service;
pub mod routing;
pub mod summary_service;
