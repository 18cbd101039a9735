// Payments domain services
pub mod cloudkassir_service;
pub mod yookassa_service;
pub mod tbank_service;
pub mod state;

pub use cloudkassir_service::*;
pub use yookassa_service::*;
pub use tbank_service::*;
pub use state::*;
