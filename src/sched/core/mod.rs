//! Núcleo do scheduler: filas, máquina de estados e dispatch.

pub mod debug;
pub mod io_wait;
pub mod queue;
pub mod scheduler;

pub use io_wait::ThreadIoWait;
pub use queue::ThreadQueue;
pub use scheduler::Scheduler;
