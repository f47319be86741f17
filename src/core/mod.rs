//! Core Module
//!
//! Objeto central do núcleo (scheduler + VMM e seus locks) e o sistema de
//! logs usado por todos os subsistemas.

pub mod kernel;
pub mod logging;

pub use kernel::Kernel;
