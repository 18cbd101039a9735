// Payments domain state
// 결제 도메인 상태
use std::sync::Arc;
use crate::domains::payments::services::{CloudKassirService, TBankService, YooKassaService};
use crate::domains::wallet::services::WalletService;
use crate::shared::clients::{CloudKassirApi, TBankApi, YooKassaApi};
use crate::shared::config::Config;
use crate::shared::database::LedgerStore;

/// 게이트웨이 클라이언트 묶음
/// Gateway clients; tests swap these for fakes
#[derive(Clone)]
pub struct GatewayClients {
    pub yookassa: Arc<dyn YooKassaApi>,
    pub tbank: Arc<dyn TBankApi>,
    pub cloudkassir: Arc<dyn CloudKassirApi>,
}

#[derive(Clone)]
pub struct PaymentsState {
    pub yookassa_service: YooKassaService,
    pub tbank_service: TBankService,
    pub cloudkassir_service: CloudKassirService,
}

impl PaymentsState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        wallet: WalletService,
        clients: GatewayClients,
        config: &Config,
    ) -> Self {
        let cloudkassir_service =
            CloudKassirService::new(clients.cloudkassir, store.clone(), config.cloudkassir.clone());
        let yookassa_service = YooKassaService::new(
            clients.yookassa,
            wallet.clone(),
            cloudkassir_service.clone(),
            config.yookassa.return_url.clone(),
        );
        let tbank_service = TBankService::new(
            clients.tbank,
            store,
            wallet,
            cloudkassir_service.clone(),
            config.tbank.password.clone(),
        );

        Self {
            yookassa_service,
            tbank_service,
            cloudkassir_service,
        }
    }
}
