//! Core business logic for oddhay-push.

pub mod services;

pub use services::*;
