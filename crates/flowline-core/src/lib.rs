pub mod config;
pub mod error;
pub mod ids;
pub mod window;

pub use config::FlowlineConfig;
pub use error::{FlowlineError, Result};
