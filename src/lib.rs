//! Stagegate: a production gate engine
//!
//! Projects move through a fixed pipeline of stages. Each stage is guarded
//! by configurable gates made of declarative requirements; a passed gate can
//! lock project data and create follow-up tasks, exactly once per project.

pub mod cli;
pub mod core;
pub mod entities;
pub mod gates;
