mod dependency;
mod install_error;

pub use dependency::*;
pub use install_error::*;

// Re-export types from descriptor-parser
pub use descriptor_parser::{Descriptor, InstallKey};
