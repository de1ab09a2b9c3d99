//! Type definitions

pub mod employee;
pub mod import_job;
pub mod messages;
pub mod response;

pub use employee::*;
pub use import_job::*;
pub use messages::*;
pub use response::*;
