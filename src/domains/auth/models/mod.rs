// Auth domain models
pub mod jwt;

pub use jwt::*;
