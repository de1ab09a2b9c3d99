//! Database queries

pub mod analytics;
pub mod employee;
pub mod import_job;
pub mod response;
