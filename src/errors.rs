//! Internal error taxonomy for plumbing boundaries (config, registry, audit
//! I/O). This is distinct from [`crate::model::ErrorDetail`], which is the
//! data-only failure carrier that crosses the kernel's public API — per
//! §7, the kernel's public methods never throw.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("audit error: {0}")]
    Audit(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = KernelError::Config("bad max_parallel".into());
        assert_eq!(err.to_string(), "configuration error: bad max_parallel");
    }

    #[test]
    fn internal_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("boom");
        let err: KernelError = anyhow_err.into();
        assert!(matches!(err, KernelError::Internal(_)));
    }
}
