use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("no business is registered for platform recipient {0}")]
    UnknownRecipient(String),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Store(#[from] flowline_store::StoreError),

    #[error(transparent)]
    Orchestrator(#[from] flowline_engine::OrchestratorError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<ChannelError> for flowline_core::FlowlineError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::MissingSignature | ChannelError::SignatureMismatch => {
                flowline_core::FlowlineError::Unauthorized
            }
            ChannelError::UnknownRecipient(m) => flowline_core::FlowlineError::NotFound(m),
            ChannelError::MalformedPayload(m) => flowline_core::FlowlineError::InvalidRequest(m),
            ChannelError::Store(e) => e.into(),
            ChannelError::Orchestrator(e) => e.into(),
        }
    }
}
