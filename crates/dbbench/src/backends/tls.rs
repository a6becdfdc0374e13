//! TLS settings shared by the session-based backends.

use serde::Deserialize;

/// SSL verification modes, following PostgreSQL's `sslmode` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP.
    Disable,
    /// TLS when the server offers it.
    #[default]
    Prefer,
    /// TLS without certificate verification.
    Require,
    /// Verify the server certificate against the CA.
    #[serde(alias = "verify_ca")]
    VerifyCa,
    /// Verify certificate and host name.
    #[serde(alias = "verify_identity", alias = "verify-identity")]
    VerifyFull,
}

impl SslMode {
    /// Whether the mode skips certificate verification.
    pub fn is_unverified(&self) -> bool {
        matches!(self, SslMode::Prefer | SslMode::Require)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        let modes: Vec<SslMode> =
            serde_json::from_str(r#"["disable", "require", "verify-ca", "verify_identity"]"#)
                .unwrap();
        assert_eq!(
            modes,
            vec![
                SslMode::Disable,
                SslMode::Require,
                SslMode::VerifyCa,
                SslMode::VerifyFull
            ]
        );
    }

    #[test]
    fn test_default_prefers_tls() {
        assert_eq!(SslMode::default(), SslMode::Prefer);
        assert!(SslMode::default().is_unverified());
    }
}
