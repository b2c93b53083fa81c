pub mod provisioner;
pub mod runner;
pub mod service_manager;

pub use crate::domain::model::{
    CommandOutput, CommandSpec, ProvisionReport, ProvisionStage, Step, StepOutcome, StepReport,
};
pub use crate::domain::ports::CommandRunner;
pub use crate::utils::error::Result;
