// Payments domain handlers
pub mod deposit_handler;
pub mod webhook_handler;

pub use deposit_handler::*;
pub use webhook_handler::*;
