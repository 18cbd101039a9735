// =====================================================
// 통합 테스트 공통 헬퍼
// =====================================================
// 목적: 메모리 저장소 + 가짜 게이트웨이 + 기록용 알림으로
//       실제 서비스/라우터를 조립
//
// 사용법:
// ```rust
// mod common;
// use common::*;
//
// #[tokio::test]
// async fn test_something() {
//     let app = TestApp::new();
//     app.seed_user(1, "1000", "0");
//     // 테스트 코드...
// }
// ```
// =====================================================
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;

use escrow_server::domains::payments::models::{
    CreatePaymentBody, ReceiptRequestBody, ReceiptResponse, YooKassaAmount, YooKassaConfirmation,
    YooKassaPayment,
};
use escrow_server::domains::payments::services::GatewayClients;
use escrow_server::routes::create_router;
use escrow_server::shared::clients::{
    CloudKassirApi, TBankApi, TBankInitRequest, TBankInitResult, TBankPayoutCall,
    TBankPayoutResult, YooKassaApi,
};
use escrow_server::shared::config::Config;
use escrow_server::shared::database::{LedgerStore, MemoryLedgerStore};
use escrow_server::shared::errors::WalletError;
use escrow_server::shared::services::{AppState, MemoryNotifier};

// 테스트용 상수
pub const CUSTOMER_ID: u64 = 1;
pub const EXECUTOR_ID: u64 = 2;
pub const OTHER_USER_ID: u64 = 3;
pub const ADMIN_ID: u64 = 99;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const TBANK_PASSWORD: &str = "test-tbank-password";
pub const CLOUDKASSIR_SECRET: &str = "test-cloudkassir-secret";

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt_secret = JWT_SECRET.to_string();
    config.tbank.password = TBANK_PASSWORD.to_string();
    config.tbank.terminal_key = "TestTerminal".to_string();
    config.cloudkassir.public_id = "test-public-id".to_string();
    config.cloudkassir.api_secret = CLOUDKASSIR_SECRET.to_string();
    config.cloudkassir.inn = "7700000000".to_string();
    config
}

// =====================================================
// 가짜 게이트웨이
// =====================================================

/// YooKassa 가짜 구현
/// 생성된 결제는 pending, `mark_succeeded`로 성공 처리
#[derive(Default)]
pub struct FakeYooKassa {
    payments: Mutex<HashMap<String, YooKassaPayment>>,
    created: Mutex<Vec<(CreatePaymentBody, String)>>,
    sequence: Mutex<u64>,
}

impl FakeYooKassa {
    pub fn created(&self) -> Vec<(CreatePaymentBody, String)> {
        self.created.lock().clone()
    }

    /// 외부에서 들어온 결제 등록 (check-payment 테스트용)
    pub fn insert_payment(&self, payment: YooKassaPayment) {
        self.payments.lock().insert(payment.id.clone(), payment);
    }

    pub fn mark_succeeded(&self, payment_id: &str) {
        if let Some(payment) = self.payments.lock().get_mut(payment_id) {
            payment.status = "succeeded".to_string();
            payment.paid = true;
        }
    }
}

#[async_trait]
impl YooKassaApi for FakeYooKassa {
    async fn create_payment(
        &self,
        body: &CreatePaymentBody,
        idempotence_key: &str,
    ) -> Result<YooKassaPayment, WalletError> {
        let id = {
            let mut sequence = self.sequence.lock();
            *sequence += 1;
            format!("yk-{}", *sequence)
        };
        let payment = YooKassaPayment {
            id: id.clone(),
            status: "pending".to_string(),
            paid: false,
            amount: body.amount.clone(),
            confirmation: Some(YooKassaConfirmation {
                kind: "redirect".to_string(),
                return_url: None,
                confirmation_url: Some(format!("https://yoomoney.test/checkout/{}", id)),
            }),
            metadata: body
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        };
        self.payments.lock().insert(id, payment.clone());
        self.created
            .lock()
            .push((body.clone(), idempotence_key.to_string()));
        Ok(payment)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<YooKassaPayment, WalletError> {
        self.payments
            .lock()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| WalletError::Gateway {
                gateway: "yookassa",
                code: Some("not_found".to_string()),
                message: format!("Payment {} not found", payment_id),
            })
    }
}

/// T-Bank 가짜 구현 (지급 실패 주입 가능)
#[derive(Default)]
pub struct FakeTBank {
    inits: Mutex<Vec<TBankInitRequest>>,
    payouts: Mutex<Vec<TBankPayoutCall>>,
    fail_payouts: Mutex<bool>,
    sequence: Mutex<u64>,
}

impl FakeTBank {
    pub fn inits(&self) -> Vec<TBankInitRequest> {
        self.inits.lock().clone()
    }

    pub fn payouts(&self) -> Vec<TBankPayoutCall> {
        self.payouts.lock().clone()
    }

    pub fn fail_payouts(&self) {
        *self.fail_payouts.lock() = true;
    }

    fn next_id(&self) -> u64 {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        *sequence
    }
}

#[async_trait]
impl TBankApi for FakeTBank {
    async fn init(&self, request: TBankInitRequest) -> Result<TBankInitResult, WalletError> {
        let id = self.next_id();
        self.inits.lock().push(request);
        Ok(TBankInitResult {
            payment_id: (7_000_000 + id).to_string(),
            payment_url: format!("https://securepay.test/{}", id),
        })
    }

    async fn payout(&self, request: TBankPayoutCall) -> Result<TBankPayoutResult, WalletError> {
        // 실제 HTTP 호출처럼 응답 전에 다른 요청이 진행될 수 있음
        tokio::task::yield_now().await;
        self.payouts.lock().push(request);
        if *self.fail_payouts.lock() {
            return Err(WalletError::Gateway {
                gateway: "tbank",
                code: Some("3001".to_string()),
                message: "Card is blocked".to_string(),
            });
        }
        Ok(TBankPayoutResult {
            gateway_payout_id: format!("e2c-{}", self.next_id()),
        })
    }
}

/// CloudKassir 가짜 구현 (요청 기록만)
#[derive(Default)]
pub struct FakeCloudKassir {
    receipts: Mutex<Vec<ReceiptRequestBody>>,
}

impl FakeCloudKassir {
    pub fn receipts(&self) -> Vec<ReceiptRequestBody> {
        self.receipts.lock().clone()
    }
}

#[async_trait]
impl CloudKassirApi for FakeCloudKassir {
    async fn request_receipt(
        &self,
        body: &ReceiptRequestBody,
    ) -> Result<ReceiptResponse, WalletError> {
        self.receipts.lock().push(body.clone());
        Ok(ReceiptResponse {
            success: true,
            message: None,
            model: None,
        })
    }
}

// =====================================================
// TestApp
// =====================================================

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryLedgerStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub yookassa: Arc<FakeYooKassa>,
    pub tbank: Arc<FakeTBank>,
    pub cloudkassir: Arc<FakeCloudKassir>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let yookassa = Arc::new(FakeYooKassa::default());
        let tbank = Arc::new(FakeTBank::default());
        let cloudkassir = Arc::new(FakeCloudKassir::default());

        let clients = GatewayClients {
            yookassa: yookassa.clone(),
            tbank: tbank.clone(),
            cloudkassir: cloudkassir.clone(),
        };
        let state = AppState::from_parts(&config, store.clone(), notifier.clone(), clients);

        Self {
            state,
            store,
            notifier,
            yookassa,
            tbank,
            cloudkassir,
        }
    }

    /// 오래된 계정 (이상거래 나이 규칙에 걸리지 않음)
    pub fn seed_user(&self, user_id: u64, balance: &str, frozen: &str) {
        self.store
            .seed_user(user_id, dec(balance), dec(frozen), Utc::now() - Duration::days(365));
    }

    /// 방금 생성된 계정
    pub fn seed_new_user(&self, user_id: u64, balance: &str) {
        self.store
            .seed_user(user_id, dec(balance), Decimal::ZERO, Utc::now() - Duration::hours(1));
    }

    pub async fn balance(&self, user_id: u64) -> (Decimal, Decimal) {
        let user = self
            .store
            .get_user_balance(user_id)
            .await
            .unwrap()
            .expect("user exists");
        (user.balance, user.frozen_balance)
    }

    /// 모든 사용자에 대해 0 <= frozen <= balance
    pub fn assert_balances_consistent(&self) {
        for user in self.store.users() {
            assert!(
                user.frozen_balance >= Decimal::ZERO && user.frozen_balance <= user.balance,
                "user {} violates 0 <= frozen ({}) <= balance ({})",
                user.user_id,
                user.frozen_balance,
                user.balance
            );
        }
    }

    pub fn token(&self, user_id: u64, is_admin: bool) -> String {
        self.state
            .auth_state
            .jwt_service
            .generate_access_token(user_id, &format!("user{}@example.com", user_id), is_admin)
            .unwrap()
    }

    pub fn router(&self) -> Router {
        create_router().with_state(self.state.clone())
    }

    /// JSON 요청 전송 → (상태 코드, 응답 본문)
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
        (status, value)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }
}

/// YooKassa 성공 웹훅 본문
pub fn yookassa_succeeded_webhook(payment_id: &str, user_id: u64, amount: &str) -> Value {
    serde_json::json!({
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": payment_id,
            "status": "succeeded",
            "paid": true,
            "amount": { "value": amount, "currency": "RUB" },
            "metadata": { "userId": user_id.to_string() }
        }
    })
}

pub fn yookassa_payment(payment_id: &str, user_id: u64, amount: &str, status: &str) -> YooKassaPayment {
    YooKassaPayment {
        id: payment_id.to_string(),
        status: status.to_string(),
        paid: status == "succeeded",
        amount: YooKassaAmount {
            value: amount.to_string(),
            currency: "RUB".to_string(),
        },
        confirmation: None,
        metadata: HashMap::from([("userId".to_string(), Value::String(user_id.to_string()))]),
    }
}
