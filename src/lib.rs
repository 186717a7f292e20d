pub mod assembly;
pub mod capture;
pub mod error;
pub mod progress;
pub mod remote;
pub mod settings;
pub mod store;

pub use error::PipelineError;
