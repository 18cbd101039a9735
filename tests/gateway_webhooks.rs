// =====================================================
// 결제 게이트웨이 통합 테스트
// =====================================================
// YooKassa 웹훅 멱등성, T-Bank 알림/지급 롤백, CloudKassir 영수증
// =====================================================

mod common;
use common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use escrow_server::domains::payments::models::{DealStatus, PayoutStatus, TBankPaymentStatus};
use escrow_server::domains::wallet::models::{EntryKind, Gateway, MoneyInput};
use escrow_server::shared::clients::{sign_content, tbank_token};
use escrow_server::shared::database::{LedgerOp, LedgerPlan, LedgerStore};
use escrow_server::shared::errors::WalletError;

/// T-Bank 알림 본문 + Token
fn tbank_notification(order_id: &str, status: &str, payment_id: u64, amount_minor: i64, deal: &str) -> Value {
    let mut body = json!({
        "TerminalKey": "TestTerminal",
        "OrderId": order_id,
        "Success": status == "CONFIRMED",
        "Status": status,
        "PaymentId": payment_id,
        "ErrorCode": "0",
        "Amount": amount_minor,
        "SpAccumulationId": deal,
    });
    let token = tbank_token(&body, TBANK_PASSWORD).unwrap();
    body["Token"] = Value::String(token);
    body
}

/// 입금 시작 + CONFIRMED 알림 → order_id
async fn confirmed_tbank_deposit(app: &TestApp, user_id: u64, amount: &str) -> String {
    let deposit = app
        .state
        .payments_state
        .tbank_service
        .init_deposit(user_id, &MoneyInput::from(amount))
        .await
        .unwrap();
    let minor = (dec(amount) * Decimal::from(100)).trunc().to_string().parse::<i64>().unwrap();
    app.state
        .payments_state
        .tbank_service
        .handle_notification(tbank_notification(&deposit.order_id, "CONFIRMED", 7_000_001, minor, "sp-1"))
        .await
        .unwrap();
    deposit.order_id
}

// ----- YooKassa -----

/// 테스트: 같은 payment.succeeded 웹훅 두 번 → 한 번만 반영
#[tokio::test]
async fn test_yookassa_webhook_redelivery_is_idempotent() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let webhook = yookassa_succeeded_webhook("abc123", CUSTOMER_ID, "1500.00");

    let (status, body) = app
        .send_json("POST", "/api/payments/yookassa/webhook", None, Some(webhook.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let (status, body) = app
        .send_json("POST", "/api/payments/yookassa/webhook", None, Some(webhook))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true, "duplicate": true }));

    assert_eq!(app.balance(CUSTOMER_ID).await.0, dec("1500"));

    let entries = app.store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, EntryKind::Deposit);
    assert_eq!(entries[0].gateway, Some(Gateway::YooKassa));
    assert!(entries[0].reason.contains("abc123"));

    // 영수증은 첫 반영 때만
    let receipts = app.cloudkassir.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].invoice_id, entries[0].id.to_string());
    assert_eq!(receipts[0].account_id, CUSTOMER_ID.to_string());
}

/// 테스트: 성공이 아닌 이벤트는 무시
#[tokio::test]
async fn test_yookassa_non_success_event_is_ignored() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let mut webhook = yookassa_succeeded_webhook("pending-1", CUSTOMER_ID, "100.00");
    webhook["event"] = json!("payment.waiting_for_capture");
    webhook["object"]["status"] = json!("waiting_for_capture");

    let (status, body) = app
        .send_json("POST", "/api/payments/yookassa/webhook", None, Some(webhook))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], json!(true));
    assert_eq!(app.balance(CUSTOMER_ID).await.0, Decimal::ZERO);
    assert!(app.store.entries().is_empty());
}

/// 테스트: metadata.userId 누락 → 400
#[tokio::test]
async fn test_yookassa_webhook_without_user_is_rejected() {
    let app = TestApp::new();
    let mut webhook = yookassa_succeeded_webhook("no-user", CUSTOMER_ID, "100.00");
    webhook["object"]["metadata"] = json!({});

    let (status, _) = app
        .send_json("POST", "/api/payments/yookassa/webhook", None, Some(webhook))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.entries().is_empty());
}

/// 테스트: 입금 생성 → 직접 확인 (웹훅 지연) → 중복 확인
#[tokio::test]
async fn test_yookassa_deposit_then_check_payment() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let payments = &app.state.payments_state.yookassa_service;

    let deposit = payments
        .create_deposit(CUSTOMER_ID, &MoneyInput::from("250.50"))
        .await
        .unwrap();
    assert!(deposit.confirmation_url.is_some());

    let created = app.yookassa.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0.amount.value, "250.50");
    assert_eq!(created[0].0.amount.currency, "RUB");
    assert!(created[0].0.capture);
    assert_eq!(created[0].0.metadata.get("userId"), Some(&CUSTOMER_ID.to_string()));
    assert!(!created[0].1.is_empty(), "idempotence key must be sent");

    // 아직 pending
    let pending = payments.check_payment(CUSTOMER_ID, &deposit.payment_id).await.unwrap();
    assert_eq!(pending.status, "pending");
    assert_eq!(pending.balance.balance, Decimal::ZERO);

    app.yookassa.mark_succeeded(&deposit.payment_id);
    let checked = payments.check_payment(CUSTOMER_ID, &deposit.payment_id).await.unwrap();
    assert_eq!(checked.balance.balance, dec("250.50"));
    assert!(!checked.duplicate);

    // 이후 웹훅이 도착해도 중복
    let again = payments.check_payment(CUSTOMER_ID, &deposit.payment_id).await.unwrap();
    assert!(again.duplicate);
    assert_eq!(again.balance.balance, dec("250.50"));
}

/// 테스트: 다른 사용자의 결제는 확인 불가
#[tokio::test]
async fn test_check_payment_of_another_user_is_forbidden() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    app.seed_user(OTHER_USER_ID, "0", "0");
    app.yookassa
        .insert_payment(yookassa_payment("foreign-1", OTHER_USER_ID, "100.00", "succeeded"));

    let result = app
        .state
        .payments_state
        .yookassa_service
        .check_payment(CUSTOMER_ID, "foreign-1")
        .await;

    assert!(matches!(result, Err(WalletError::Forbidden { .. })));
    assert_eq!(app.balance(OTHER_USER_ID).await.0, Decimal::ZERO);
}

// ----- T-Bank -----

/// 테스트: T-Bank 입금 (HTTP) → CONFIRMED 알림 → 잔고 반영, 재전송 무시
#[tokio::test]
async fn test_tbank_deposit_confirmed_once() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let token = app.token(CUSTOMER_ID, false);

    let (status, body) = app
        .send_json(
            "POST",
            "/api/wallet/tbank/deposit",
            Some(&token),
            Some(json!({ "amount": "1000.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["orderId"].as_str().unwrap().to_string();
    assert!(body["paymentUrl"].as_str().unwrap().starts_with("https://"));

    let notification = tbank_notification(&order_id, "CONFIRMED", 7_000_001, 100_000, "sp-1");
    for _ in 0..2 {
        let (status, body) = app
            .send_json("POST", "/api/payments/tbank/notification", None, Some(notification.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("OK"));
    }

    assert_eq!(app.balance(CUSTOMER_ID).await.0, dec("1000"));
    assert_eq!(app.store.entries().len(), 1);

    let payment = &app.store.tbank_payments()[0];
    assert_eq!(payment.status, TBankPaymentStatus::Confirmed);
    assert_eq!(payment.payment_id.as_deref(), Some("7000001"));

    let deal = &app.store.deals()[0];
    assert_eq!(deal.deal_id.as_deref(), Some("sp-1"));
    assert_eq!(deal.total_amount, dec("1000"));
    assert_eq!(deal.remaining_balance, dec("1000"));

    // 다음 입금은 같은 딜에 누적
    app.state
        .payments_state
        .tbank_service
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("50"))
        .await
        .unwrap();
    let inits = app.tbank.inits();
    assert_eq!(inits[0].sp_accumulation_id, None);
    assert_eq!(inits[1].sp_accumulation_id.as_deref(), Some("sp-1"));
}

/// 테스트: 잘못된 Token → 403, 잔고 변화 없음
#[tokio::test]
async fn test_tbank_notification_with_bad_token_is_rejected() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let deposit = app
        .state
        .payments_state
        .tbank_service
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();

    let mut notification = tbank_notification(&deposit.order_id, "CONFIRMED", 1, 10_000, "sp-1");
    notification["Amount"] = json!(99_999_900);

    let (status, _) = app
        .send_json("POST", "/api/payments/tbank/notification", None, Some(notification))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.balance(CUSTOMER_ID).await.0, Decimal::ZERO);
}

/// 테스트: 알 수 없는 OrderId → 404
#[tokio::test]
async fn test_tbank_notification_for_unknown_order() {
    let app = TestApp::new();
    let notification = tbank_notification("missing-order", "CONFIRMED", 1, 10_000, "sp-1");

    let (status, _) = app
        .send_json("POST", "/api/payments/tbank/notification", None, Some(notification))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// 테스트: REJECTED 알림은 상태만 갱신
#[tokio::test]
async fn test_tbank_rejected_payment_is_not_credited() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    let tbank = &app.state.payments_state.tbank_service;
    let deposit = tbank
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();

    tbank
        .handle_notification(tbank_notification(&deposit.order_id, "REJECTED", 1, 10_000, "sp-1"))
        .await
        .unwrap();

    assert_eq!(app.store.tbank_payments()[0].status, TBankPaymentStatus::Rejected);
    assert_eq!(app.balance(CUSTOMER_ID).await.0, Decimal::ZERO);
    assert!(app.store.entries().is_empty());
}

/// 테스트: 지급 성공 (동결 → 정산, 딜 차감)
#[tokio::test]
async fn test_tbank_payout_settles_frozen_funds() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;

    let completed = app
        .state
        .payments_state
        .tbank_service
        .payout(CUSTOMER_ID, &MoneyInput::from("400"), false, Some("card-1".to_string()))
        .await
        .unwrap();

    assert_eq!(completed.payout.status, PayoutStatus::Completed);
    assert!(completed.payout.gateway_payout_id.is_some());
    assert_eq!(completed.balance.balance, dec("600"));
    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("600"), Decimal::ZERO));

    let calls = app.tbank.payouts();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].deal_id, "sp-1");
    assert_eq!(calls[0].order_id, format!("payout-{}", completed.payout.id));
    assert_eq!(calls[0].card_id.as_deref(), Some("card-1"));

    let deal = &app.store.deals()[0];
    assert_eq!(deal.paid_amount, dec("400"));
    assert_eq!(deal.remaining_balance, dec("600"));
    assert_eq!(deal.status, DealStatus::Open);

    let payout_entry = app
        .store
        .entries()
        .into_iter()
        .find(|e| e.kind == EntryKind::Payout)
        .unwrap();
    assert_eq!(payout_entry.amount, dec("-400"));
    assert_eq!(payout_entry.gateway, Some(Gateway::TBank));
}

/// 테스트: 게이트웨이 실패 시 동결 롤백, 지급 failed 기록
#[tokio::test]
async fn test_tbank_payout_failure_rolls_back_freeze() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;
    app.tbank.fail_payouts();

    let result = app
        .state
        .payments_state
        .tbank_service
        .payout(CUSTOMER_ID, &MoneyInput::from("400"), false, None)
        .await;

    match result {
        Err(WalletError::Gateway { gateway, code, .. }) => {
            assert_eq!(gateway, "tbank");
            assert_eq!(code.as_deref(), Some("3001"));
        }
        other => panic!("expected gateway error, got {:?}", other),
    }

    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("1000"), Decimal::ZERO));
    let payouts = app.store.payouts();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].status, PayoutStatus::Failed);
    assert_eq!(payouts[0].error_message.as_deref(), Some("tbank error: Card is blocked"));
    assert_eq!(app.store.deals()[0].paid_amount, Decimal::ZERO);
    app.assert_balances_consistent();
}

/// 테스트: 최종 지급은 딜을 닫음, 남은 잔액 초과 불가
#[tokio::test]
async fn test_tbank_final_payout_closes_deal() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;
    let tbank = &app.state.payments_state.tbank_service;

    let too_much = tbank
        .payout(CUSTOMER_ID, &MoneyInput::from("1000.01"), false, None)
        .await;
    assert!(matches!(too_much, Err(WalletError::InsufficientFunds { .. })));

    tbank
        .payout(CUSTOMER_ID, &MoneyInput::from("300"), true, None)
        .await
        .unwrap();
    assert_eq!(app.store.deals()[0].status, DealStatus::Closed);

    let after_close = tbank
        .payout(CUSTOMER_ID, &MoneyInput::from("100"), false, None)
        .await;
    assert!(matches!(after_close, Err(WalletError::NotFound { .. })));
}

/// 테스트: 확인된 입금이 없는 딜에서는 지급 불가
#[tokio::test]
async fn test_tbank_payout_without_confirmed_deal() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");
    let tbank = &app.state.payments_state.tbank_service;

    let no_deal = tbank.payout(CUSTOMER_ID, &MoneyInput::from("100"), false, None).await;
    assert!(matches!(no_deal, Err(WalletError::NotFound { .. })));

    tbank
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();
    let unconfirmed = tbank.payout(CUSTOMER_ID, &MoneyInput::from("100"), false, None).await;
    assert!(matches!(unconfirmed, Err(WalletError::Conflict(_))));
    assert!(app.tbank.payouts().is_empty());
}

/// 테스트: 딜이 닫힌 뒤 도착한 입금 확인도 잔고에 반영
#[tokio::test]
async fn test_tbank_confirmation_after_deal_closed_is_credited() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;
    let tbank = &app.state.payments_state.tbank_service;

    // 같은 OPEN 딜에 두 번째 입금 시작, 확인 전에 최종 지급으로 딜 종료
    let late = tbank
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("500"))
        .await
        .unwrap();
    tbank
        .payout(CUSTOMER_ID, &MoneyInput::from("300"), true, None)
        .await
        .unwrap();
    assert_eq!(app.store.deals()[0].status, DealStatus::Closed);

    tbank
        .handle_notification(tbank_notification(&late.order_id, "CONFIRMED", 7_000_002, 50_000, "sp-1"))
        .await
        .unwrap();

    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("1200"), Decimal::ZERO));
    let payment = app
        .store
        .tbank_payments()
        .into_iter()
        .find(|p| p.order_id == late.order_id)
        .unwrap();
    assert_eq!(payment.status, TBankPaymentStatus::Confirmed);

    let deal = &app.store.deals()[0];
    assert_eq!(deal.status, DealStatus::Closed);
    assert_eq!(deal.total_amount, dec("1500"));
    assert_eq!(deal.paid_amount, dec("300"));
    assert_eq!(deal.remaining_balance, dec("1200"));

    // 재전송은 여전히 한 번만 반영
    tbank
        .handle_notification(tbank_notification(&late.order_id, "CONFIRMED", 7_000_002, 50_000, "sp-1"))
        .await
        .unwrap();
    assert_eq!(app.balance(CUSTOMER_ID).await.0, dec("1200"));

    // 다음 입금은 새 딜
    tbank
        .init_deposit(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();
    assert_eq!(app.store.deals().len(), 2);
    assert_eq!(app.tbank.inits().last().unwrap().sp_accumulation_id, None);
}

/// 테스트: 동시 지급은 딜 잔액을 한 번만 사용
#[tokio::test]
async fn test_tbank_concurrent_payouts_cannot_overdraw_deal() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "2000", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;
    let tbank = &app.state.payments_state.tbank_service;

    let amount_a = MoneyInput::from("600");
    let amount_b = MoneyInput::from("600");
    let (first, second) = tokio::join!(
        tbank.payout(CUSTOMER_ID, &amount_a, false, None),
        tbank.payout(CUSTOMER_ID, &amount_b, false, None),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(WalletError::InsufficientFunds { .. }))));

    // 게이트웨이 호출도 한 번
    assert_eq!(app.tbank.payouts().len(), 1);
    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("2400"), Decimal::ZERO));

    let deal = &app.store.deals()[0];
    assert_eq!(deal.paid_amount, dec("600"));
    assert_eq!(deal.remaining_balance, dec("400"));
    assert_eq!(deal.reserved_amount, Decimal::ZERO);
    app.assert_balances_consistent();
}

/// 테스트: 진행 중 지급 예약분은 다른 지급에서 사용 불가, 실패 시 해제
#[tokio::test]
async fn test_tbank_pending_payout_reservation_blocks_and_releases() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    confirmed_tbank_deposit(&app, CUSTOMER_ID, "1000").await;
    let deal_row_id = app.store.deals()[0].id;

    let reserve = |amount: &str| {
        LedgerPlan::new().push(LedgerOp::ReserveDealPayout {
            deal_row_id,
            amount: dec(amount),
        })
    };
    app.store.execute(reserve("600")).await.unwrap();
    assert!(matches!(
        app.store.execute(reserve("600")).await,
        Err(WalletError::InsufficientFunds { .. })
    ));

    // 서비스 경로도 예약분을 뺀 금액 기준
    let tbank = &app.state.payments_state.tbank_service;
    assert!(matches!(
        tbank.payout(CUSTOMER_ID, &MoneyInput::from("500"), false, None).await,
        Err(WalletError::InsufficientFunds { .. })
    ));

    // 게이트웨이 실패 시 예약 해제
    app.tbank.fail_payouts();
    assert!(tbank
        .payout(CUSTOMER_ID, &MoneyInput::from("400"), false, None)
        .await
        .is_err());
    assert_eq!(app.store.deals()[0].reserved_amount, dec("600"));
    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("1000"), Decimal::ZERO));
}

// ----- CloudKassir -----

async fn post_receipt(app: &TestApp, body: &Value, hmac: Option<String>) -> (StatusCode, Value) {
    let raw = body.to_string();
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/cloudkassir/receipt")
        .header("Content-Type", "application/json");
    if let Some(hmac) = hmac {
        builder = builder.header("X-Content-HMAC", hmac);
    }
    let (status, bytes) = app.send(builder.body(Body::from(raw)).unwrap()).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// 테스트: 서명된 영수증 콜백 → 원장 기록에 1회 연결
#[tokio::test]
async fn test_cloudkassir_receipt_attached_once() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");
    app.state
        .payments_state
        .yookassa_service
        .handle_webhook(serde_json::from_value(yookassa_succeeded_webhook("yk-r", CUSTOMER_ID, "100.00")).unwrap())
        .await
        .unwrap();
    let entry_id = app.store.entries()[0].id;

    let body = json!({ "Id": "receipt-1", "InvoiceId": entry_id.to_string(), "Amount": 100.0 });
    let signature = sign_content(body.to_string().as_bytes(), CLOUDKASSIR_SECRET);

    let (status, ack) = post_receipt(&app, &body, Some(signature.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "code": 0 }));
    assert_eq!(app.store.entries()[0].receipt_id.as_deref(), Some("receipt-1"));

    // 재전송 → 그대로 code 0
    let (status, ack) = post_receipt(&app, &body, Some(signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, json!({ "code": 0 }));

    // 다른 영수증 ID는 덮어쓰지 않음
    let conflicting = json!({ "Id": "receipt-2", "InvoiceId": entry_id.to_string() });
    let (status, _) = post_receipt(&app, &conflicting, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.entries()[0].receipt_id.as_deref(), Some("receipt-1"));
}

/// 테스트: 잘못된 서명 → 403, 잘못된 InvoiceId → 400
#[tokio::test]
async fn test_cloudkassir_receipt_rejects_bad_input() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "0", "0");

    let body = json!({ "Id": "receipt-1", "InvoiceId": "1" });
    let (status, _) = post_receipt(&app, &body, Some("bm90LWEtc2lnbmF0dXJl".to_string())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({ "Id": "receipt-1", "InvoiceId": "not-a-number" });
    let (status, _) = post_receipt(&app, &body, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "Id": "receipt-1", "InvoiceId": "4242" });
    let (status, _) = post_receipt(&app, &body, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
