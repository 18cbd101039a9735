// Escrow domain models
pub mod task;
pub mod reservation;
pub mod dispute;
pub mod escrow;

pub use task::*;
pub use reservation::*;
pub use dispute::*;
pub use escrow::*;
