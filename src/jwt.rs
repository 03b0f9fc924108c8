use std::sync::Arc;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::errors::AppError;
use crate::utils::normalize_email;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret, exp_hours))
    }

    pub fn new(secret: impl Into<String>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into().into_bytes()),
            exp_hours,
        }
    }

    /// Signs an identity token. The identity layer normally issues these; the
    /// CLI and tests use this for local tokens.
    pub fn encode(&self, email: &str, domain_member: bool) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = IdentityClaims {
            sub: normalize_email(email),
            domain_member,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<IdentityClaims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<IdentityClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

/// Verified identity handed over by the identity layer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IdentityClaims {
    /// Email address of the authenticated user.
    pub sub: String,
    #[serde(default)]
    pub domain_member: bool,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_normalizes_email() {
        let jwt = JwtConfig::new("test-secret", 1);
        let token = jwt.encode("Ada@Example.COM", true).unwrap();
        let claims = jwt.decode(&token).unwrap();

        assert_eq!(claims.sub, "ada@example.com");
        assert!(claims.domain_member);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtConfig::new("one", 1).encode("ada@example.com", false).unwrap();
        let err = JwtConfig::new("two", 1).decode(&token).unwrap_err();

        assert!(matches!(err, AppError::Token(_)));
    }
}
