use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Issues and verifies HS256 tokens signed with the shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_token_expiry_days: i64,
    refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_expiry_days: config.access_token_expiry_days,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        }
    }

    pub fn generate_access_token(&self, user_id: Uuid, email: &str) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::days(self.access_token_expiry_days)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::days(self.refresh_token_expiry_days)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode refresh token: {}", e))
    }

    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<TokenResponse, anyhow::Error> {
        Ok(TokenResponse {
            access_token: self.generate_access_token(user_id, email)?,
            refresh_token: self.generate_refresh_token(user_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry_seconds(),
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;
        validation
    }

    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
    }

    /// Rejects access tokens even when correctly signed.
    pub fn validate_refresh_token(
        &self,
        token: &str,
    ) -> Result<RefreshTokenClaims, jsonwebtoken::errors::Error> {
        let claims = decode::<RefreshTokenClaims>(token, &self.decoding_key, &self.validation())?
            .claims;

        if claims.token_type != REFRESH_TOKEN_TYPE {
            return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
        }

        Ok(claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_days * 24 * 60 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;
    use secrecy::Secret;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Secret::new("unit-test-secret-unit-test-secret".to_string()),
            issuer: "job-platform-api".to_string(),
            audience: "job-platform-client".to_string(),
            access_token_expiry_days: 90,
            refresh_token_expiry_days: 7,
        }
    }

    #[test]
    fn access_token_round_trips_identity() {
        let jwt = JwtService::new(&config());
        let user_id = Uuid::new_v4();

        let token = jwt.generate_access_token(user_id, "ana@example.com").unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.exp - claims.iat, 90 * 24 * 60 * 60);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let jwt = JwtService::new(&config());
        let pair = jwt.generate_token_pair(Uuid::new_v4(), "ana@example.com").unwrap();

        assert!(jwt.validate_refresh_token(&pair.access_token).is_err());
        assert!(jwt.validate_access_token(&pair.refresh_token).is_err());
        assert!(jwt.validate_refresh_token(&pair.refresh_token).is_ok());
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = JwtService::new(&config())
            .generate_access_token(Uuid::new_v4(), "ana@example.com")
            .unwrap();

        let mut other = config();
        other.secret = Secret::new("a-completely-different-secret-value".to_string());
        assert!(JwtService::new(&other).validate_access_token(&token).is_err());
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let token = JwtService::new(&config())
            .generate_access_token(Uuid::new_v4(), "ana@example.com")
            .unwrap();

        let mut other = config();
        other.audience = "someone-else".to_string();
        let err = JwtService::new(&other).validate_access_token(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidAudience));
    }

    #[test]
    fn expired_token_reports_expiry() {
        let jwt = JwtService::new(&config());
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: Uuid::new_v4().to_string(),
            email: "ana@example.com".to_string(),
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: "job-platform-api".to_string(),
            aud: "job-platform-client".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret-unit-test-secret"),
        )
        .unwrap();

        let err = jwt.validate_access_token(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }
}
