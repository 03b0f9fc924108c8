use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Fresh identifier with a readable prefix, e.g. `doc-1f0c...`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Emails are compared case-insensitively everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix_and_are_unique() {
        let a = new_id("doc");
        let b = new_id("doc");

        assert!(a.starts_with("doc-"));
        assert_ne!(a, b);
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
