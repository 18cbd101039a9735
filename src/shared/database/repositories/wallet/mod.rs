// Wallet repositories
pub mod user_repository;
pub mod ledger_entry_repository;

pub use user_repository::*;
pub use ledger_entry_repository::*;
