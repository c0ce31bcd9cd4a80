/// Configuration loading failures. Startup-fatal by construction; callers
/// are expected to propagate these out of `main` rather than recover.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}
