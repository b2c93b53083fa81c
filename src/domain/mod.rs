// Domain layer: provisioning models and the command-execution port.

pub mod model;
pub mod ports;
