//! HTTP request handlers organized by functionality

pub mod analyze;
pub mod shop;
pub mod system;
