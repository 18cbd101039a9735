// =====================================================
// 출금 파이프라인 통합 테스트
// =====================================================
// 금액 검증 → 이상거래 게이트 → 잠긴 잔고 확인 → 차감 + 기록
// =====================================================

mod common;
use common::*;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use escrow_server::domains::escrow::models::{Task, TaskStatus};
use escrow_server::domains::wallet::models::{EntryKind, MoneyInput};
use escrow_server::shared::errors::WalletError;

fn completed_task(id: u64, customer_id: u64, executor_id: u64, days_ago: i64) -> Task {
    let at = Utc::now() - Duration::days(days_ago);
    Task {
        id,
        customer_id,
        executor_id: Some(executor_id),
        title: format!("Task {}", id),
        budget: Decimal::from(100),
        escrow_amount: Decimal::from(100),
        status: TaskStatus::Completed,
        cancellation_requested_at: None,
        cancellation_reason: None,
        completed_at: Some(at),
        created_at: at,
        updated_at: at,
    }
}

/// 테스트: 출금 성공 (balance=1000, frozen=0, 500 출금 → 500)
#[tokio::test]
async fn test_withdraw_within_available_balance() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");

    let outcome = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("500"))
        .await
        .expect("withdrawal should succeed");

    assert_eq!(outcome.balance.balance, dec("500"));
    assert_eq!(outcome.entry.kind, EntryKind::Withdraw);
    assert_eq!(outcome.entry.amount, dec("-500"));
    assert!(outcome.warnings.is_empty());
    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("500"), Decimal::ZERO));
}

/// 테스트: 동결 금액 때문에 잔액 부족 (available 200 < 300)
#[tokio::test]
async fn test_withdraw_rejected_when_frozen_funds_leave_too_little() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "800");

    let result = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("300"))
        .await;

    assert_eq!(
        result.unwrap_err(),
        WalletError::InsufficientFunds {
            available: dec("200"),
            required: dec("300"),
        }
    );
    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("1000"), dec("800")));
    assert!(app.store.entries().is_empty(), "rejected withdrawal must not leave a ledger entry");
}

/// 테스트: 잘못된 금액 형식은 잔고를 건드리지 않음
#[tokio::test]
async fn test_withdraw_rejects_malformed_amounts() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");
    let wallet = &app.state.wallet_state.wallet_service;

    for raw in ["", "abc", "0", "-5", "1,5", "10.001", "NaN"] {
        let result = wallet.withdraw(CUSTOMER_ID, &MoneyInput::from(raw)).await;
        assert!(
            matches!(result, Err(WalletError::InvalidInput(_))),
            "amount {:?} should be rejected, got {:?}",
            raw,
            result
        );
    }

    assert_eq!(app.balance(CUSTOMER_ID).await, (dec("1000"), Decimal::ZERO));
}

/// 테스트: 숫자 JSON 금액도 허용
#[tokio::test]
async fn test_withdraw_accepts_numeric_input() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "100", "0");

    let input: MoneyInput = serde_json::from_value(serde_json::json!(12.5)).unwrap();
    let outcome = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &input)
        .await
        .unwrap();

    assert_eq!(outcome.balance.balance, dec("87.5"));
}

/// 테스트: 신규 계정 고액 출금 차단
#[tokio::test]
async fn test_new_account_large_withdrawal_is_blocked() {
    let app = TestApp::new();
    app.seed_new_user(CUSTOMER_ID, "20000");

    let result = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("6000"))
        .await;

    assert!(matches!(result, Err(WalletError::WithdrawalBlocked { .. })));
    assert_eq!(app.balance(CUSTOMER_ID).await.0, dec("20000"));

    // 한도 이하는 허용
    app.state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("5000"))
        .await
        .expect("withdrawal at the new-account limit is allowed");
}

/// 테스트: 신규 계정 고액 출금은 관리자 알림 (차단하지 않음)
#[tokio::test]
async fn test_large_withdrawal_from_recent_account_alerts_admins() {
    let mut config = test_config();
    config.fraud.min_account_age_hours = 0;
    let app = TestApp::with_config(config);
    app.seed_new_user(CUSTOMER_ID, "50000");

    app.state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("10000"))
        .await
        .expect("alert does not block");

    let alerts = app.notifier.admin_alerts();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("10000"));
}

/// 테스트: 알림 실패는 출금을 막지 않음
#[tokio::test]
async fn test_notifier_failure_does_not_block_withdrawal() {
    let mut config = test_config();
    config.fraud.min_account_age_hours = 0;
    let app = TestApp::with_config(config);
    app.seed_new_user(CUSTOMER_ID, "50000");
    app.notifier.fail_all();

    let outcome = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("10000"))
        .await
        .unwrap();

    assert_eq!(outcome.balance.balance, dec("40000"));
}

/// 테스트: 순환 거래 (상호 완료 작업 3건 이상) 차단, 그 미만은 경고
#[tokio::test]
async fn test_circular_deals_warn_then_block() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");
    app.seed_user(EXECUTOR_ID, "1000", "0");

    // 1 → 2, 2 → 1 각각 1건 (합계 2건: 경고)
    app.store.seed_task(completed_task(100, CUSTOMER_ID, EXECUTOR_ID, 3));
    app.store.seed_task(completed_task(101, EXECUTOR_ID, CUSTOMER_ID, 2));

    let outcome = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);

    // 세 번째 상호 작업 → 차단
    app.store.seed_task(completed_task(102, CUSTOMER_ID, EXECUTOR_ID, 1));
    let result = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("100"))
        .await;
    assert!(matches!(result, Err(WalletError::WithdrawalBlocked { .. })));
}

/// 테스트: 기간 밖의 상호 작업은 세지 않음
#[tokio::test]
async fn test_old_reciprocal_deals_are_ignored() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");
    app.store.seed_task(completed_task(100, CUSTOMER_ID, EXECUTOR_ID, 60));
    app.store.seed_task(completed_task(101, EXECUTOR_ID, CUSTOMER_ID, 61));
    app.store.seed_task(completed_task(102, CUSTOMER_ID, EXECUTOR_ID, 62));

    let outcome = app
        .state
        .wallet_state
        .wallet_service
        .withdraw(CUSTOMER_ID, &MoneyInput::from("100"))
        .await
        .unwrap();
    assert!(outcome.warnings.is_empty());
}

/// 테스트: 원장 내역은 최신순, limit 적용
#[tokio::test]
async fn test_transactions_newest_first_with_limit() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");
    let wallet = &app.state.wallet_state.wallet_service;

    for amount in ["10", "20", "30"] {
        wallet.withdraw(CUSTOMER_ID, &MoneyInput::from(amount)).await.unwrap();
    }

    let all = wallet.list_transactions(CUSTOMER_ID, None).await.unwrap();
    let amounts: Vec<Decimal> = all.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![dec("-30"), dec("-20"), dec("-10")]);

    let limited = wallet.list_transactions(CUSTOMER_ID, Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

/// 테스트: 동시 출금 (잔고 이상으로 출금되지 않음)
#[tokio::test]
async fn test_concurrent_withdrawals_never_overdraw() {
    let app = TestApp::new();
    app.seed_user(CUSTOMER_ID, "1000", "0");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let wallet = app.state.wallet_state.wallet_service.clone();
        handles.push(tokio::spawn(async move {
            wallet.withdraw(CUSTOMER_ID, &MoneyInput::from("300")).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(app.balance(CUSTOMER_ID).await.0, dec("100"));
    app.assert_balances_consistent();
}
