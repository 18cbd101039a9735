// Escrow repositories
pub mod task_repository;
pub mod reservation_repository;
pub mod dispute_repository;

pub use task_repository::*;
pub use reservation_repository::*;
pub use dispute_repository::*;
