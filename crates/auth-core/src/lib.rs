//! ag-auth-core - 认证核心库
//!
//! JWT Claims 与令牌签发/校验。权限不写入令牌，由服务端按用户解析

use ag_common::UserId;
use ag_errors::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ACCESS_TOKEN: &str = "access";

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// 用户邮箱
    #[serde(default)]
    pub email: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// JWT ID
    pub jti: String,
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Audience
    #[serde(default)]
    pub aud: String,
    /// Token type
    #[serde(default)]
    pub token_type: String,
}

impl Claims {
    pub fn new(
        user_id: &UserId,
        email: &str,
        expires_in_secs: i64,
        issuer: &str,
        audience: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.0.to_string(),
            email: email.to_string(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::now_v7().to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            token_type: ACCESS_TOKEN.to_string(),
        }
    }

    pub fn user_id(&self) -> AppResult<UserId> {
        Uuid::parse_str(&self.sub)
            .map(UserId::from_uuid)
            .map_err(|_| AppError::unauthenticated("Invalid user ID in token"))
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type == ACCESS_TOKEN
    }
}

/// Token 服务
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: i64,
    issuer: String,
    audience: String,
}

impl TokenService {
    pub fn new(secret: &str, expires_in: i64, issuer: String, audience: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
            issuer,
            audience,
        }
    }

    /// 签发访问令牌
    pub fn issue_token(&self, user_id: &UserId, email: &str) -> AppResult<String> {
        let claims = Claims::new(user_id, email, self.expires_in, &self.issuer, &self.audience);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))
    }

    /// 验证访问令牌
    pub fn validate_access_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::unauthenticated(format!("Invalid token: {}", e)))?
            .claims;

        if claims.jti.is_empty() {
            return Err(AppError::unauthenticated("Token ID (jti) missing"));
        }

        if !claims.is_access_token() {
            return Err(AppError::unauthenticated("Not an access token"));
        }

        Ok(claims)
    }

    /// 访问令牌有效期（秒）
    pub fn expires_in(&self) -> i64 {
        self.expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            "test-secret",
            3600,
            "autogestor".to_string(),
            "autogestor-api".to_string(),
        )
    }

    #[test]
    fn test_issue_and_validate() {
        let service = service();
        let user_id = UserId::new();
        let token = service.issue_token(&user_id, "ana@example.com").unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "ana@example.com");
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let other = TokenService::new(
            "other-secret",
            3600,
            "autogestor".to_string(),
            "autogestor-api".to_string(),
        );
        let token = other.issue_token(&UserId::new(), "x@example.com").unwrap();

        let err = service().validate_access_token(&token).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_rejects_wrong_audience() {
        let other = TokenService::new(
            "test-secret",
            3600,
            "autogestor".to_string(),
            "someone-else".to_string(),
        );
        let token = other.issue_token(&UserId::new(), "x@example.com").unwrap();

        assert!(service().validate_access_token(&token).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let expired = TokenService::new(
            "test-secret",
            -120,
            "autogestor".to_string(),
            "autogestor-api".to_string(),
        );
        let token = expired.issue_token(&UserId::new(), "x@example.com").unwrap();

        assert!(service().validate_access_token(&token).is_err());
    }
}
