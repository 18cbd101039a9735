// Escrow domain state
// 에스크로 도메인 상태
use rust_decimal::Decimal;
use std::sync::Arc;
use crate::domains::escrow::services::EscrowService;
use crate::shared::database::LedgerStore;
use crate::shared::services::notifier::Notifier;

#[derive(Clone)]
pub struct EscrowState {
    pub escrow_service: EscrowService,
}

impl EscrowState {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>, commission_rate: Decimal) -> Self {
        Self {
            escrow_service: EscrowService::new(store, notifier, commission_rate),
        }
    }
}
