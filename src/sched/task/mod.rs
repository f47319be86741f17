//! Threads: TCB, estados, eventos e a arena que as contém.

pub mod accounting;
pub mod context;
pub mod entity;
pub mod events;
pub mod state;
pub mod table;

pub use accounting::Accounting;
pub use context::CpuContext;
pub use entity::Thread;
pub use events::{Events, WaitObj};
pub use state::{QueueKind, ThreadState};
pub use table::{ThreadHandle, ThreadTable};
