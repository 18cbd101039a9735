// Shared services
pub mod app_state;
pub mod notifier;

pub use app_state::*;
pub use notifier::*;
