use thiserror::Error;

/// Returned by an individual `Provider`. A provider error never
/// fails the whole render — the engine catches it and substitutes
/// `[Missing: name]` instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("variable '{0}' is not registered")]
    Unknown(String),

    #[error("could not compute '{name}': {reason}")]
    Unavailable { name: String, reason: String },
}

pub type ProviderResult = std::result::Result<String, ProviderError>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("store error: {0}")]
    Store(#[from] flowline_store::StoreError),
}

pub type Result<T> = std::result::Result<T, TemplateError>;

impl From<TemplateError> for flowline_core::FlowlineError {
    fn from(e: TemplateError) -> Self {
        match e {
            TemplateError::Store(e) => e.into(),
        }
    }
}
