//! # Page Frame Manager (PFM)
//!
//! Interface com o alocador de frames físicos. O VMM só aloca, libera e
//! copia frames através de [`PhysMemory`]; o refcount de frames COW fica em
//! [`cow::CowTracker`].

pub mod cow;
pub mod pool;

pub use cow::CowTracker;
pub use pool::FramePool;

use crate::mm::addr::FrameNo;
use crate::mm::config::PAGE_SIZE;

/// Colaborador de memória física
pub trait PhysMemory {
    /// Aloca um frame (conteúdo indefinido). `None` = sem memória.
    fn alloc_frame(&mut self) -> Option<FrameNo>;

    /// Aloca `count` frames fisicamente contíguos
    fn alloc_contiguous(&mut self, count: usize) -> Option<FrameNo>;

    fn free_frame(&mut self, frame: FrameNo);

    /// Conteúdo do frame (`None` para frames fora do pool, ex: MMIO)
    fn frame(&self, frame: FrameNo) -> Option<&[u8]>;

    fn frame_mut(&mut self, frame: FrameNo) -> Option<&mut [u8]>;

    fn free_frames(&self) -> usize;

    fn total_frames(&self) -> usize;

    /// Copia `src` para `dst`. Falso se algum dos dois não é acessível.
    fn copy_frame(&mut self, src: FrameNo, dst: FrameNo) -> bool {
        let mut buf = [0u8; PAGE_SIZE];
        match self.frame(src) {
            Some(data) => buf.copy_from_slice(data),
            None => return false,
        }
        match self.frame_mut(dst) {
            Some(data) => {
                data.copy_from_slice(&buf);
                true
            }
            None => false,
        }
    }

    /// Zera o frame
    fn zero_frame(&mut self, frame: FrameNo) -> bool {
        match self.frame_mut(frame) {
            Some(data) => {
                data.fill(0);
                true
            }
            None => false,
        }
    }
}

/// Estatísticas de alocação
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PfmStats {
    pub allocations: u64,
    pub frees: u64,
    pub failed: u64,
}
