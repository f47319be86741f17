//! Definições de Sistema.
//!
//! Identificadores compartilhados entre o scheduler e o gerenciador de memória.

pub mod types;

pub use types::{FileId, FileOffset, Pid, Tid};
