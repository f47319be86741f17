//! # Memory Management Subsystem (MM)
//!
//! Regiões de memória virtual de processos e o resolvedor de page faults.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Regiões:** text, rodata, data, stacks, shm, device, tls, bibliotecas e
//!   memória física contígua, com proteção e estado por página.
//! - **Faults:** demand loading do binário, zero-fill, copy-on-write e swap.
//! - **Reclaim:** escolha de vítimas (região LRU + página aleatória) e
//!   swap-out.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo    | Responsabilidade |
//! |-----------|------------------|
//! | `addr`    | `VirtAddr`, `FrameNo` |
//! | `config`  | Layout do espaço de usuário, limites, `VmmConfig` |
//! | `pfm`     | Interface com o alocador de frames, pool em memória, refcount COW |
//! | `region`  | Região, flags, estado por página |
//! | `aspace`  | Espaço de endereçamento (número de região → endereço) |
//! | `vmm`     | Dono de regiões e espaços; tabela de páginas (`mapper`) |
//! | `fault`   | Resolvedor de page faults, cópia kernel ↔ usuário |
//! | `swap`    | Slots e dispositivo de swap |
//! | `reclaim` | Seleção de vítimas, pressão de memória |
//! | `io`      | Colaboradores de I/O e o gancho de bloqueio |
//!
//! ## 🔒 Locking
//!
//! O [`Vmm`] inteiro fica atrás de um único lock (o lock de paginação). Quando
//! um fault precisa bloquear a thread durante o I/O, o lock do scheduler é
//! tomado **depois** do de paginação, nunca o contrário.
//!
//! ```text
//!  page fault ──▶ Vmm::resolve_fault ──▶ Region ──▶ PhysMemory / BinaryStore / Swap
//!                        │
//!                        └── IoWait ──▶ Scheduler::wait / unblock_all
//! ```

pub mod addr;
pub mod aspace;
pub mod config;
pub mod error;
pub mod fault;
pub mod io;
pub mod pfm;
pub mod reclaim;
pub mod region;
pub mod swap;
pub mod test;
pub mod vmm;

pub use addr::{FrameNo, VirtAddr};
pub use aspace::{AddressSpace, VmRegion};
pub use config::{MemoryWatermarks, VmmConfig, PAGE_SIZE};
pub use error::{MmError, MmResult};
pub use fault::{AccessType, FaultAction, FaultError, PageFaultInfo};
pub use io::{BinaryStore, IoError, IoWait, MemBinaryStore, NoWait};
pub use pfm::{CowTracker, FramePool, PhysMemory};
pub use reclaim::MemoryPressure;
pub use region::{
    BinDesc, PageEntry, PageFlags, PageState, Region, RegionFlags, RegionId, RegionType,
};
pub use swap::{MemSwapDevice, SwapDevice, SwapSlot, SwapSpace};
pub use vmm::{MapFlags, MemUsage, PageDir, Pte, Vmm, VmmStats};
