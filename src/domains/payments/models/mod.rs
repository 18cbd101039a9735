// Payments domain models
pub mod yookassa;
pub mod tbank;
pub mod cloudkassir;
pub mod payments;

pub use yookassa::*;
pub use tbank::*;
pub use cloudkassir::*;
pub use payments::*;
