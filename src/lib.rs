pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::ProvisionConfig;
pub use crate::core::{
    provisioner::Provisioner,
    runner::{DryRunRunner, SystemCommandRunner},
    service_manager::{ServiceDefinition, ServiceManager},
};
pub use crate::utils::error::{ProvisionError, Result};
