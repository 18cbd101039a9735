use anyhow::Context;
use axum::Router;
use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use escrow_server::routes::create_router;
use escrow_server::shared::config::Config;
use escrow_server::shared::database::Database;
use escrow_server::shared::services::AppState;

// Import models for OpenAPI schema
use escrow_server::domains::wallet::models::*;
use escrow_server::domains::escrow::models::*;
use escrow_server::domains::payments::models::*;
use escrow_server::domains::catalog::models::*;

// OpenAPI 스키마 정의: Swagger 문서 자동 생성
#[derive(OpenApi)]
#[openapi(
    paths(
        escrow_server::domains::wallet::handlers::wallet_handler::get_balance,
        escrow_server::domains::wallet::handlers::wallet_handler::get_transactions,
        escrow_server::domains::wallet::handlers::wallet_handler::withdraw,
        escrow_server::domains::payments::handlers::deposit_handler::create_deposit,
        escrow_server::domains::payments::handlers::deposit_handler::check_payment,
        escrow_server::domains::payments::handlers::deposit_handler::tbank_deposit,
        escrow_server::domains::payments::handlers::deposit_handler::tbank_payout,
        escrow_server::domains::escrow::handlers::escrow_handler::create_task,
        escrow_server::domains::escrow::handlers::escrow_handler::get_task,
        escrow_server::domains::escrow::handlers::escrow_handler::accept_executor,
        escrow_server::domains::escrow::handlers::escrow_handler::cancel_task,
        escrow_server::domains::escrow::handlers::escrow_handler::request_cancellation,
        escrow_server::domains::escrow::handlers::escrow_handler::respond_cancellation,
        escrow_server::domains::escrow::handlers::escrow_handler::complete_task,
        escrow_server::domains::escrow::handlers::escrow_handler::open_dispute,
        escrow_server::domains::escrow::handlers::escrow_handler::resolve_dispute,
        escrow_server::domains::payments::handlers::webhook_handler::yookassa_webhook,
        escrow_server::domains::payments::handlers::webhook_handler::tbank_notification,
        escrow_server::domains::payments::handlers::webhook_handler::cloudkassir_receipt,
        escrow_server::domains::catalog::handlers::category_handler::list_categories
    ),
    components(schemas(
        UserBalance,
        BalanceResponse,
        LedgerEntry,
        EntryKind,
        Gateway,
        TransactionsResponse,
        WithdrawRequest,
        WithdrawResponse,
        Task,
        TaskStatus,
        EscrowReservation,
        ReleaseKind,
        Dispute,
        DisputeStatus,
        DisputeOutcome,
        CreateTaskRequest,
        AcceptExecutorRequest,
        CancellationRequestBody,
        CancellationAction,
        CancellationRespondRequest,
        OpenDisputeRequest,
        ResolveDisputeRequest,
        TaskResponse,
        TaskActionResponse,
        CompletionResponse,
        DisputeResponse,
        DepositRequest,
        DepositResponse,
        CheckPaymentRequest,
        CheckPaymentResponse,
        WebhookAck,
        TBankDepositResponse,
        TBankPayoutRequest,
        TBankPayoutResponse,
        TBankDeal,
        DealStatus,
        TBankPayment,
        TBankPaymentStatus,
        TBankPayout,
        PayoutStatus,
        TBankNotification,
        CloudKassirReceiptCallback,
        CloudKassirAck,
        YooKassaAmount,
        YooKassaConfirmation,
        YooKassaPayment,
        YooKassaWebhook,
        Category,
        CategoriesResponse
    )),
    modifiers(
        &SecurityAddon
    ),
    tags(
        (name = "Wallet", description = "Balance, ledger history and withdrawals"),
        (name = "Payments", description = "YooKassa and T-Bank deposits and payouts"),
        (name = "Tasks", description = "Task escrow lifecycle"),
        (name = "Admin", description = "Dispute resolution (admin only)"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
        (name = "Catalog", description = "Task categories")
    ),
    info(
        title = "Escrow Server",
        description = "Wallet, escrow and payment gateway API for the freelance marketplace",
        version = "1.0.0"
    )
)]
struct ApiDoc;

// Security scheme 정의: Swagger UI에서 "Authorize" 버튼 추가
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "BearerAuth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 로드 (없어도 됨)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,escrow_server=debug")),
        )
        .init();

    let config = Config::from_env()?;

    // DB 연결 + 마이그레이션
    let db = Database::new(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    db.initialize()
        .await
        .context("Failed to initialize database")?;

    // AppState 생성 (모든 Service 초기화)
    let app_state = AppState::new(&config, db).context("Failed to initialize AppState")?;

    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .context("Invalid CORS_ORIGIN")?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    // Router 생성
    let app = Router::new()
        .merge(create_router())
        .merge(
            SwaggerUi::new("/api")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "escrow server listening");
    tracing::info!("Swagger UI available at http://{}/api", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
