//! Data model and collaborator contracts shared by the sync engine.

pub mod defs;
pub mod services;
pub mod state;
pub mod upstream;
pub mod validation;

pub use defs::{Code, Entity, Id};
pub use services::{ServiceError, ServiceResult};
pub use validation::ValidationError;
