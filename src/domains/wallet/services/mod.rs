// Wallet domain services
pub mod fraud_service;
pub mod wallet_service;
pub mod state;

pub use fraud_service::*;
pub use wallet_service::*;
pub use state::*;
