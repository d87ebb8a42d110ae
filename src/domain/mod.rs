// Shared models and the storage port. No network code lives here.

pub mod model;
pub mod ports;
