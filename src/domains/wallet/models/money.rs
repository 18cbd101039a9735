use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::fmt;
use std::str::FromStr;
use crate::shared::errors::WalletError;

// =====================================================
// 금액 값 타입 (Money value type)
// =====================================================
// 역할: 사용자가 입력한 금액을 정확한 Decimal로 변환/검증
//
// 규칙:
// - 문자열 또는 JSON 숫자 모두 허용
// - 0, 음수, NaN/Infinity, 소수점 3자리 이상은 거부
// - 부동소수점(f64) 연산은 절대 사용하지 않음
//   (JSON 숫자도 텍스트 표현 그대로 Decimal로 파싱)
// =====================================================

/// 한 번에 다룰 수 있는 최대 금액
/// Upper bound for a single amount
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// 허용되는 소수점 자릿수 (kopecks)
pub const MONEY_SCALE: u32 = 2;

/// 클라이언트가 보낸 원시 금액 (문자열 또는 숫자)
/// Raw amount as sent by a client: `"1500.50"` or `1500.5`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MoneyInput {
    Number(serde_json::Number),
    Text(String),
}

impl MoneyInput {
    fn as_text(&self) -> String {
        match self {
            MoneyInput::Number(n) => n.to_string(),
            MoneyInput::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for MoneyInput {
    fn from(value: &str) -> Self {
        MoneyInput::Text(value.to_string())
    }
}

/// 검증된 양수 금액
/// A validated, strictly positive amount with at most two fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[schema(value_type = String, example = "1500.00")]
pub struct Amount(Decimal);

impl Amount {
    /// 원시 입력 파싱 및 검증
    /// Parse and validate raw user input
    pub fn parse(input: &MoneyInput) -> Result<Self, WalletError> {
        let text = input.as_text();
        let value = parse_decimal(&text)?;
        Self::from_decimal(value)
    }

    /// 이미 Decimal인 값을 검증
    pub fn from_decimal(value: Decimal) -> Result<Self, WalletError> {
        if !is_positive_amount(value) {
            return Err(WalletError::InvalidInput(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let value = value.normalize();
        if value.scale() > MONEY_SCALE {
            return Err(WalletError::InvalidInput(format!(
                "Amount must have at most {} decimal places",
                MONEY_SCALE
            )));
        }
        if value > MAX_AMOUNT {
            return Err(WalletError::InvalidInput(format!(
                "Amount exceeds maximum of {}",
                MAX_AMOUNT
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, WalletError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WalletError::InvalidInput("Amount is required".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("nan") || lower.contains("inf") {
        return Err(WalletError::InvalidInput(
            "Amount must be a finite number".to_string(),
        ));
    }
    if trimmed.contains('_') || trimmed.contains(',') {
        return Err(WalletError::InvalidInput(format!(
            "Invalid amount format: {}",
            trimmed
        )));
    }

    let parsed = if lower.contains('e') {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    };

    parsed.map_err(|_| WalletError::InvalidInput(format!("Invalid amount format: {}", trimmed)))
}

/// 0보다 큰 금액인지 확인
/// Rejects zero and negative values (Decimal cannot hold NaN or infinity)
pub fn is_positive_amount(value: Decimal) -> bool {
    value > Decimal::ZERO
}

/// 사용 가능 잔고(balance - frozen)가 요청 금액 이상인지 확인
/// Check `balance - frozen_balance >= requested`
pub fn has_enough_balance(balance: Decimal, frozen_balance: Decimal, requested: Decimal) -> bool {
    balance - frozen_balance >= requested
}

/// 게이트웨이용 최소 단위(kopecks) 변환
/// Convert to gateway minor units (kopecks)
pub fn to_minor_units(value: Decimal) -> Result<i64, WalletError> {
    let scaled = value * Decimal::from(100);
    if !scaled.fract().is_zero() {
        return Err(WalletError::InvalidInput(format!(
            "Amount {} is not representable in kopecks",
            value
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| WalletError::InvalidInput(format!("Amount {} is out of range", value)))
}

/// 최소 단위(kopecks)를 Decimal로 변환
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MONEY_SCALE)
}

/// "1500.00" 형식 (YooKassa amount.value)
pub fn to_gateway_string(value: Decimal) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(raw: &str) -> MoneyInput {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn parses_strings_and_numbers() {
        assert_eq!(
            Amount::parse(&"1500.50".into()).unwrap().value(),
            Decimal::new(150050, 2)
        );
        assert_eq!(
            Amount::parse(&number("1500.5")).unwrap().value(),
            Decimal::new(15005, 1)
        );
        assert_eq!(Amount::parse(&number("500")).unwrap().value(), Decimal::from(500));
        assert_eq!(Amount::parse(&" 42 ".into()).unwrap().value(), Decimal::from(42));
    }

    #[test]
    fn json_numbers_do_not_drift() {
        // 0.1 + 0.2 in f64 is 0.30000000000000004
        let a = Amount::parse(&number("0.1")).unwrap().value();
        let b = Amount::parse(&number("0.2")).unwrap().value();
        assert_eq!(a + b, Decimal::new(3, 1));
    }

    #[test]
    fn rejects_invalid_input() {
        for raw in ["", "abc", "NaN", "Infinity", "-inf", "0", "0.00", "-10", "1,5", "1_000"] {
            assert!(
                matches!(Amount::parse(&raw.into()), Err(WalletError::InvalidInput(_))),
                "expected rejection for {raw:?}"
            );
        }
        assert!(Amount::parse(&number("-5")).is_err());
        assert!(Amount::parse(&number("0")).is_err());
    }

    #[test]
    fn rejects_sub_kopeck_precision() {
        assert!(Amount::parse(&"10.001".into()).is_err());
        // trailing zeros are not extra precision
        assert_eq!(
            Amount::parse(&"10.500".into()).unwrap().value(),
            Decimal::new(105, 1)
        );
    }

    #[test]
    fn rejects_above_maximum() {
        assert!(Amount::parse(&"1000000000.01".into()).is_err());
        assert!(Amount::parse(&"1000000000".into()).is_ok());
    }

    #[test]
    fn scientific_notation_is_exact() {
        assert_eq!(Amount::parse(&"1.5e3".into()).unwrap().value(), Decimal::from(1500));
    }

    #[test]
    fn positive_amount_check() {
        assert!(is_positive_amount(Decimal::new(1, 2)));
        assert!(!is_positive_amount(Decimal::ZERO));
        assert!(!is_positive_amount(Decimal::new(-1, 0)));
    }

    #[test]
    fn enough_balance_uses_available_only() {
        let balance = Decimal::from(1000);
        assert!(has_enough_balance(balance, Decimal::ZERO, Decimal::from(500)));
        assert!(has_enough_balance(balance, Decimal::from(800), Decimal::from(200)));
        assert!(!has_enough_balance(balance, Decimal::from(800), Decimal::from(300)));
    }

    #[test]
    fn minor_units() {
        assert_eq!(to_minor_units(Decimal::new(150050, 2)).unwrap(), 150050);
        assert_eq!(from_minor_units(150050), Decimal::new(150050, 2));
        assert!(to_minor_units(Decimal::new(1, 3)).is_err());
        assert_eq!(to_gateway_string(Decimal::from(1500)), "1500.00");
    }
}
