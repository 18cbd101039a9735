// Wallet domain models
pub mod money;
pub mod balance;
pub mod transaction;
pub mod wallet;

pub use money::*;
pub use balance::*;
pub use transaction::*;
pub use wallet::*;
