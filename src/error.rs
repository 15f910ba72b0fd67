use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `embedfix`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum FixError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Rewrite rules ────────────────────────────────────────────────────
    #[error("rule: {0}")]
    Rule(#[from] RuleError),

    // ── Chat gateway ─────────────────────────────────────────────────────
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    // ── Guild settings store ────────────────────────────────────────────
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Rewrite rule errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("pattern for {platform} failed to compile: {message}")]
    Pattern { platform: String, message: String },

    #[error("rule for {platform} has no replacement domains")]
    NoCandidates { platform: String },
}

// ─── Chat gateway errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    #[error("missing permissions")]
    PermissionDenied,

    #[error("unexpected payload: {0}")]
    Protocol(String),
}

// ─── Settings store errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("sqlx: {0}")]
    Sqlx(String),

    #[error("guild not found: {0}")]
    GuildNotFound(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, FixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = FixError::Config(ConfigError::Validation("empty bot token".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn rule_pattern_error_names_platform() {
        let err = FixError::Rule(RuleError::Pattern {
            platform: "twitter".into(),
            message: "unclosed group".into(),
        });
        assert!(err.to_string().contains("twitter"));
        assert!(err.to_string().contains("unclosed group"));
    }

    #[test]
    fn gateway_request_displays_status() {
        let err = FixError::Gateway(GatewayError::Request {
            status: 404,
            message: "Unknown Message".into(),
        });
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn permission_denied_is_distinguishable() {
        let err = GatewayError::PermissionDenied;
        assert!(matches!(err, GatewayError::PermissionDenied));
        assert!(err.to_string().contains("permissions"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let fix_err: FixError = anyhow_err.into();
        assert!(fix_err.to_string().contains("something went wrong"));
    }
}
