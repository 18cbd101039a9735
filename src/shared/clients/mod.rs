// External payment gateway clients
pub mod yookassa;
pub mod tbank;
pub mod cloudkassir;

pub use yookassa::*;
pub use tbank::*;
pub use cloudkassir::*;
