//! CLI command implementations

pub mod advance;
pub mod check;
pub mod gate;
pub mod init;
pub mod locks;
pub mod tasks;
pub mod validate;
