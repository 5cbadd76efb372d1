//! REST API surface

pub mod analysis;
pub mod health;
pub mod openapi;
