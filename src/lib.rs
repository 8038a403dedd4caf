//! Turns a design file and a model's free-text build plan into a site,
//! one recoverable phase at a time.

pub mod build;
pub mod config;
pub mod design;
pub mod error;
pub mod plan;
pub mod response;
pub mod retry;
pub mod source;
pub mod workspace;

pub use error::{Error, Result};
