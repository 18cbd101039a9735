// All repositories module
pub mod wallet;
pub mod escrow;
pub mod payments;
pub mod catalog;

// Re-export all repositories for convenience
pub use wallet::*;
pub use escrow::*;
pub use payments::*;
pub use catalog::*;
