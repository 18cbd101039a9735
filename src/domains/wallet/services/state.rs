// Wallet domain state
// 지갑 도메인 상태
use std::sync::Arc;
use crate::domains::wallet::services::{FraudService, WalletService};
use crate::shared::config::FraudConfig;
use crate::shared::database::LedgerStore;
use crate::shared::services::notifier::Notifier;

/// Wallet domain state
/// 지갑 도메인에서 필요한 서비스들을 포함하는 상태
#[derive(Clone)]
pub struct WalletState {
    pub wallet_service: WalletService,
}

impl WalletState {
    pub fn new(store: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>, fraud: FraudConfig) -> Self {
        let fraud_service = FraudService::new(store.clone(), fraud);
        Self {
            wallet_service: WalletService::new(store, fraud_service, notifier),
        }
    }
}
