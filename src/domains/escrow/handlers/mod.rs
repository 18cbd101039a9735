// Escrow domain handlers
pub mod escrow_handler;

pub use escrow_handler::*;
