use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;

/// Process configuration read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub identity: IdentityConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;
        let port = std::env::var("APP_PORT")
            .map(|val| val.parse::<u16>())
            .unwrap_or(Ok(DEFAULT_PORT))
            .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?;

        Ok(Self {
            database_url,
            port,
            jwt: JwtConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
        })
    }
}

/// How identities from the identity layer are admitted.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Organisation domain used to compute `domain_member` for locally issued tokens.
    pub allowed_domain: Option<String>,
    /// Reject identities that are not members of the organisation domain.
    pub require_domain_member: bool,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let allowed_domain = std::env::var("ALLOWED_DOMAIN")
            .ok()
            .map(|domain| domain.trim().trim_start_matches('@').to_lowercase())
            .filter(|domain| !domain.is_empty());

        let require_domain_member = match std::env::var("REQUIRE_DOMAIN_MEMBER") {
            Ok(raw) => parse_flag(&raw)
                .ok_or_else(|| AppError::configuration("REQUIRE_DOMAIN_MEMBER must be true or false"))?,
            Err(_) => false,
        };

        Ok(Self {
            allowed_domain,
            require_domain_member,
        })
    }

    /// Domain membership of `email`. Without a configured domain nobody is a member.
    pub fn is_domain_member(&self, email: &str) -> bool {
        let Some(domain) = self.allowed_domain.as_deref() else {
            return false;
        };

        email
            .rsplit_once('@')
            .is_some_and(|(_, host)| host.eq_ignore_ascii_case(domain))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_membership_matches_host_exactly() {
        let config = IdentityConfig {
            allowed_domain: Some("acme.example".to_string()),
            require_domain_member: true,
        };

        assert!(config.is_domain_member("ada@acme.example"));
        assert!(config.is_domain_member("ada@ACME.example"));
        assert!(!config.is_domain_member("ada@notacme.example"));
        assert!(!config.is_domain_member("ada@acme.example.evil"));
        assert!(!IdentityConfig::default().is_domain_member("ada@acme.example"));
    }

    #[test]
    fn flags_parse_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
