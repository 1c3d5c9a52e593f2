//! Domain layer - value objects, the platform enum and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod model;
pub mod platform;
pub mod ports;

pub use model::*;
pub use platform::PlatformType;
pub use ports::*;
