// Domain modules
pub mod auth;
pub mod wallet;
pub mod escrow;
pub mod payments;
pub mod catalog;
