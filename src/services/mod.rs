//! Business logic services

pub mod analytics;
pub mod import;
pub mod import_processor;
