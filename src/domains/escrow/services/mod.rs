// Escrow domain services
pub mod escrow_service;
pub mod state;

pub use escrow_service::*;
pub use state::*;
