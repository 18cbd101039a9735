// Catalog domain services
pub mod category_cache;
pub mod state;

pub use category_cache::*;
pub use state::*;
