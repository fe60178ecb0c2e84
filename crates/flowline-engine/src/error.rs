use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("conversation {0} is busy")]
    Busy(String),

    #[error(transparent)]
    Store(#[from] flowline_store::StoreError),

    #[error(transparent)]
    StageMachine(#[from] flowline_stage::StageMachineError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl From<OrchestratorError> for flowline_core::FlowlineError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Busy(id) => {
                tracing::debug!(conversation_id = %id, "lease acquisition timed out");
                flowline_core::FlowlineError::Busy {
                    retry_after_secs: 5,
                }
            }
            OrchestratorError::Store(e) => e.into(),
            OrchestratorError::StageMachine(e) => e.into(),
        }
    }
}
