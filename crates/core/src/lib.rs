//! Business logic for sinmungo.

pub mod services;

pub use services::*;
