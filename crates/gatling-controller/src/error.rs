//! Controller error types

use gatling_providers::NotifyError;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Common(#[from] gatling_common::Error),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("missing namespace on Gatling")]
    MissingNamespace,

    #[error("Gatling {0} has no uid; owned objects cannot reference it yet")]
    MissingUid(String),

    #[error("notification secret {0} not found")]
    MissingSecret(String),
}

impl ControllerError {
    /// Whether the failure may clear up on its own
    ///
    /// Every error is requeued regardless; this only decides how loudly the
    /// failure is logged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube(e) => !matches!(
                e,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409
            ),
            Self::Common(e) => e.is_retryable(),
            Self::Notify(e) => e.is_retryable(),
            Self::MissingNamespace => false,
            Self::MissingUid(_) | Self::MissingSecret(_) => true,
        }
    }
}
