use thiserror::Error;

/// Failure taxonomy of the rendition service.
///
/// `ConfigurationFailed` and `DependencyMissing` stop the process before the
/// worker loop starts. Per-profile failures never surface here; they are folded
/// into the run summary instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("download failed: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("asset is {size} bytes, above the {ceiling} byte ceiling")]
    AssetTooLarge { size: u64, ceiling: u64 },

    #[error("configuration error: {0}")]
    ConfigurationFailed(String),

    #[error("encoder unavailable: {0}")]
    DependencyMissing(String),
}

impl AppError {
    pub fn acquisition(reason: impl Into<String>) -> Self {
        AppError::AcquisitionFailed {
            reason: reason.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
