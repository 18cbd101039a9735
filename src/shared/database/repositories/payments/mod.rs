// Payment gateway repositories
pub mod tbank_repository;

pub use tbank_repository::*;
