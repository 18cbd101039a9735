use std::sync::Arc;
use anyhow::Result;
use crate::domains::auth::services::{AuthState, JwtService};
use crate::domains::catalog::services::CatalogState;
use crate::domains::escrow::services::EscrowState;
use crate::domains::payments::services::{GatewayClients, PaymentsState};
use crate::domains::wallet::services::WalletState;
use crate::shared::clients::{CloudKassirClient, TBankClient, YooKassaClient};
use crate::shared::config::Config;
use crate::shared::database::{Database, LedgerStore, PgLedgerStore};
use crate::shared::services::notifier::{DbNotifier, Notifier};

/// Application state (combines all domain states)
/// 애플리케이션 상태 (모든 도메인 상태를 조합)
///
/// 모든 도메인이 같은 LedgerStore를 공유
#[derive(Clone)]
pub struct AppState {
    /// 잔고/원장 저장소 (공유)
    pub store: Arc<dyn LedgerStore>,
    pub auth_state: AuthState,
    pub wallet_state: WalletState,
    pub escrow_state: EscrowState,
    pub payments_state: PaymentsState,
    pub catalog_state: CatalogState,
}

impl AppState {
    /// Create AppState with PostgreSQL and live gateway clients
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        // 1. 공유 의존성 (저장소, 알림, 게이트웨이)
        let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db.clone()));
        let notifier: Arc<dyn Notifier> = Arc::new(DbNotifier::new(db.pool().clone()));
        let clients = GatewayClients {
            yookassa: Arc::new(YooKassaClient::new(config.yookassa.clone())?),
            tbank: Arc::new(TBankClient::new(config.tbank.clone())?),
            cloudkassir: Arc::new(CloudKassirClient::new(config.cloudkassir.clone())?),
        };

        Ok(Self::from_parts(config, store, notifier, clients))
    }

    /// 의존성을 직접 주입해서 조합 (테스트: 메모리 저장소 + 가짜 게이트웨이)
    pub fn from_parts(
        config: &Config,
        store: Arc<dyn LedgerStore>,
        notifier: Arc<dyn Notifier>,
        clients: GatewayClients,
    ) -> Self {
        // 2. 각 도메인 State 생성
        let auth_state = AuthState::new(JwtService::new(&config.jwt_secret));
        let wallet_state = WalletState::new(store.clone(), notifier.clone(), config.fraud.clone());
        let escrow_state = EscrowState::new(store.clone(), notifier, config.commission_rate);
        let payments_state = PaymentsState::new(
            store.clone(),
            wallet_state.wallet_service.clone(),
            clients,
            config,
        );
        let catalog_state = CatalogState::new(store.clone(), config.category_cache_ttl);

        // 3. AppState 조합
        Self {
            store,
            auth_state,
            wallet_state,
            escrow_state,
            payments_state,
            catalog_state,
        }
    }
}
