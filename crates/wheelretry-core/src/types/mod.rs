//! Type definitions for wheelretry configuration

mod runtime_config;

pub use runtime_config::*;
