//! PACK/v2 carrier format implementation

pub mod assembler;
pub mod cli;
pub mod constants;
pub mod container;
pub mod exec_image;
pub mod extraction;
pub mod launcher;
pub mod loader;
pub mod manifest;

// Re-export main functions
pub use assembler::assemble;
pub use launcher::run_all;
pub use loader::load;

// Re-export types for advanced usage
pub use loader::LoadedContainer;
pub use manifest::{Manifest, PayloadEntry};
