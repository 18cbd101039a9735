use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

// =====================================================
// 환경 설정
// =====================================================
// .env (dotenvy) 또는 환경 변수에서 읽음
// DATABASE_URL 외에는 모두 기본값 있음
// =====================================================

/// 서버 전체 설정
/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub cors_origin: String,
    pub jwt_secret: String,
    /// 플랫폼 수수료율 (0.10 = 10%)
    pub commission_rate: Decimal,
    pub category_cache_ttl: Duration,
    pub yookassa: YooKassaConfig,
    pub tbank: TBankConfig,
    pub cloudkassir: CloudKassirConfig,
    pub fraud: FraudConfig,
}

#[derive(Debug, Clone)]
pub struct YooKassaConfig {
    pub shop_id: String,
    pub secret_key: String,
    pub return_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct TBankConfig {
    pub terminal_key: String,
    pub password: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct CloudKassirConfig {
    pub public_id: String,
    pub api_secret: String,
    pub api_url: String,
    pub inn: String,
}

/// 이상거래 탐지 임계값
/// Anti-fraud thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct FraudConfig {
    /// 이 시간보다 어린 계정은 큰 금액 출금 불가
    pub min_account_age_hours: i64,
    pub new_account_limit: Decimal,
    /// 관리자 알림 기준 금액
    pub large_withdrawal_alert: Decimal,
    pub alert_account_age_days: i64,
    /// 순환 거래 차단 기준 (상호 완료 작업 수)
    pub circular_deal_block: u32,
    pub circular_window_days: i64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            min_account_age_hours: 24,
            new_account_limit: Decimal::from(5000),
            large_withdrawal_alert: Decimal::from(10000),
            alert_account_age_days: 7,
            circular_deal_block: 3,
            circular_window_days: 30,
        }
    }
}

impl FraudConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_account_age_hours: env_parse("FRAUD_MIN_ACCOUNT_AGE_HOURS", defaults.min_account_age_hours),
            new_account_limit: env_parse("FRAUD_NEW_ACCOUNT_LIMIT", defaults.new_account_limit),
            large_withdrawal_alert: env_parse("FRAUD_LARGE_WITHDRAWAL_ALERT", defaults.large_withdrawal_alert),
            alert_account_age_days: env_parse("FRAUD_ALERT_ACCOUNT_AGE_DAYS", defaults.alert_account_age_days),
            circular_deal_block: env_parse("FRAUD_CIRCULAR_DEAL_BLOCK", defaults.circular_deal_block),
            circular_window_days: env_parse("FRAUD_CIRCULAR_WINDOW_DAYS", defaults.circular_window_days),
        }
    }
}

/// 기본 수수료율 10%
pub fn default_commission_rate() -> Decimal {
    Decimal::new(10, 2)
}

impl Default for Config {
    /// 로컬 실행 / 테스트용 기본값
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: 10,
            bind_addr: "0.0.0.0:3002".to_string(),
            cors_origin: "http://localhost:3003".to_string(),
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            commission_rate: default_commission_rate(),
            category_cache_ttl: Duration::from_secs(300),
            yookassa: YooKassaConfig {
                shop_id: String::new(),
                secret_key: String::new(),
                return_url: "http://localhost:3003/wallet".to_string(),
                api_url: "https://api.yookassa.ru".to_string(),
            },
            tbank: TBankConfig {
                terminal_key: String::new(),
                password: String::new(),
                api_url: "https://securepay.tinkoff.ru".to_string(),
            },
            cloudkassir: CloudKassirConfig {
                public_id: String::new(),
                api_secret: String::new(),
                api_url: "https://api.cloudpayments.ru".to_string(),
                inn: String::new(),
            },
            fraud: FraudConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let d = Self::default();

        Ok(Self {
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", d.database_max_connections),
            bind_addr: env_or("BIND_ADDR", &d.bind_addr),
            cors_origin: env_or("CORS_ORIGIN", &d.cors_origin),
            jwt_secret: env_or("JWT_SECRET", &d.jwt_secret),
            commission_rate: env_parse("COMMISSION_RATE", d.commission_rate),
            category_cache_ttl: Duration::from_secs(env_parse(
                "CATEGORY_CACHE_TTL_SECS",
                d.category_cache_ttl.as_secs(),
            )),
            yookassa: YooKassaConfig {
                shop_id: env_or("YOOKASSA_SHOP_ID", &d.yookassa.shop_id),
                secret_key: env_or("YOOKASSA_SECRET_KEY", &d.yookassa.secret_key),
                return_url: env_or("YOOKASSA_RETURN_URL", &d.yookassa.return_url),
                api_url: env_or("YOOKASSA_API_URL", &d.yookassa.api_url),
            },
            tbank: TBankConfig {
                terminal_key: env_or("TBANK_TERMINAL_KEY", &d.tbank.terminal_key),
                password: env_or("TBANK_PASSWORD", &d.tbank.password),
                api_url: env_or("TBANK_API_URL", &d.tbank.api_url),
            },
            cloudkassir: CloudKassirConfig {
                public_id: env_or("CLOUDKASSIR_PUBLIC_ID", &d.cloudkassir.public_id),
                api_secret: env_or("CLOUDKASSIR_API_SECRET", &d.cloudkassir.api_secret),
                api_url: env_or("CLOUDKASSIR_API_URL", &d.cloudkassir.api_url),
                inn: env_or("CLOUDKASSIR_INN", &d.cloudkassir.inn),
            },
            fraud: FraudConfig::from_env(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 파싱 실패 시 경고 로그 후 기본값
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "invalid config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
