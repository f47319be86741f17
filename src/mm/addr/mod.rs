//! Tipos de endereço (virtual e frame físico)

mod frame;
mod virt;

pub use frame::FrameNo;
pub use virt::VirtAddr;
