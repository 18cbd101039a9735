// src/domains/auth/services/jwt_service.rs
use crate::shared::errors::AuthError;
use crate::domains::auth::models::jwt::Claims;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// JWT 서비스
/// JWT Service for token generation and verification
///
/// 토큰 발급은 외부 인증 서비스가 하고, 이 서버는 같은 secret으로 검증만 함.
/// generate_access_token은 로컬 실행과 테스트에서 사용.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// JWT Service 생성
    /// Create JWT Service
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Access Token 발급 (1시간)
    /// Generate Access Token
    pub fn generate_access_token(
        &self,
        user_id: u64,
        email: &str,
        is_admin: bool,
    ) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, email.to_string(), is_admin, 1);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate access token: {}", e)))
    }

    /// Access Token 검증
    /// Verify Access Token (만료 포함)
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "access token rejected");
                AuthError::InvalidToken
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let service = JwtService::new("secret");
        let token = service.generate_access_token(7, "user@example.com", true).unwrap();

        let claims = service.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert!(claims.is_admin);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = JwtService::new("secret")
            .generate_access_token(7, "user@example.com", false)
            .unwrap();

        let result = JwtService::new("other").verify_access_token(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
