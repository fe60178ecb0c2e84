use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageMachineError {
    #[error("business {0} has no stages configured")]
    NoStages(String),

    #[error("transition from {from} to {to} is not permitted")]
    TransitionNotAllowed { from: String, to: String },

    #[error(transparent)]
    Store(#[from] flowline_store::StoreError),
}

pub type Result<T> = std::result::Result<T, StageMachineError>;

impl From<StageMachineError> for flowline_core::FlowlineError {
    fn from(e: StageMachineError) -> Self {
        match e {
            StageMachineError::NoStages(id) => {
                flowline_core::FlowlineError::NotFound(format!("no stages for business {id}"))
            }
            StageMachineError::TransitionNotAllowed { from, to } => {
                flowline_core::FlowlineError::Conflict(format!(
                    "transition from {from} to {to} is not permitted"
                ))
            }
            StageMachineError::Store(e) => e.into(),
        }
    }
}
