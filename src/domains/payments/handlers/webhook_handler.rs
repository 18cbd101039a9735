use crate::domains::payments::models::{CloudKassirAck, WebhookAck, YooKassaWebhook};
use crate::shared::services::AppState;
use crate::shared::errors::WalletError;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

// =====================================================
// 게이트웨이 콜백 (인증 없음, 서명으로 검증)
// =====================================================

/// CloudKassir 서명 헤더
const CONTENT_HMAC_HEADER: &str = "X-Content-HMAC";

/// YooKassa 웹훅
/// Redeliveries answer `{ received: true, duplicate: true }`
#[utoipa::path(
    post,
    path = "/api/payments/yookassa/webhook",
    request_body = YooKassaWebhook,
    responses(
        (status = 200, description = "Webhook received", body = WebhookAck),
        (status = 400, description = "Missing or invalid metadata.userId")
    ),
    tag = "Webhooks"
)]
pub async fn yookassa_webhook(
    State(app_state): State<AppState>,
    Json(webhook): Json<YooKassaWebhook>,
) -> Result<Json<WebhookAck>, (StatusCode, Json<serde_json::Value>)> {
    let duplicate = app_state
        .payments_state
        .yookassa_service
        .handle_webhook(webhook)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(if duplicate {
        WebhookAck::duplicate()
    } else {
        WebhookAck::received()
    }))
}

/// T-Bank 알림
/// Answers the plain text `OK` T-Bank expects
#[utoipa::path(
    post,
    path = "/api/payments/tbank/notification",
    responses(
        (status = 200, description = "Notification accepted", body = String),
        (status = 403, description = "Invalid token"),
        (status = 404, description = "Unknown OrderId")
    ),
    tag = "Webhooks"
)]
pub async fn tbank_notification(
    State(app_state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<&'static str, (StatusCode, Json<serde_json::Value>)> {
    app_state
        .payments_state
        .tbank_service
        .handle_notification(body)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok("OK")
}

/// CloudKassir 영수증 콜백
/// 서명 검증을 위해 원문 바이트를 그대로 받음
#[utoipa::path(
    post,
    path = "/api/payments/cloudkassir/receipt",
    responses(
        (status = 200, description = "Receipt callback accepted", body = CloudKassirAck),
        (status = 400, description = "Invalid callback body"),
        (status = 403, description = "Invalid X-Content-HMAC signature")
    ),
    tag = "Webhooks"
)]
pub async fn cloudkassir_receipt(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CloudKassirAck>, (StatusCode, Json<serde_json::Value>)> {
    let hmac = headers
        .get(CONTENT_HMAC_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = app_state
        .payments_state
        .cloudkassir_service
        .handle_callback(&body, hmac)
        .await
        .map_err(|e: WalletError| -> (StatusCode, Json<serde_json::Value>) { e.into() })?;

    Ok(Json(ack))
}
