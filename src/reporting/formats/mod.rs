//! Report output formats

pub mod json;
pub mod markdown;
pub mod text;
