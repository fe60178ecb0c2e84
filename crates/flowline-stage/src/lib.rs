pub mod error;
pub mod machine;

pub use error::{Result, StageMachineError};
pub use machine::StageMachine;
