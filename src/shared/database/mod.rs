// Database module
pub mod connection;
pub mod store;
pub mod memory;
pub mod postgres;
pub mod repositories;

pub use connection::Database;
pub use store::{LedgerOp, LedgerPlan, LedgerStore, PlanOutcome, ReciprocalDeals};
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
