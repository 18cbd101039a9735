// Catalog domain models
pub mod category;

pub use category::*;
