//! Pool de frames em memória
//!
//! Implementação de [`PhysMemory`] sobre um bloco de RAM contíguo, com
//! bitmap de ocupação (bit 1 = frame em uso).

use alloc::vec;
use alloc::vec::Vec;

use super::{PfmStats, PhysMemory};
use crate::klib::bitmap::Bitmap;
use crate::mm::addr::FrameNo;
use crate::mm::config::PAGE_SIZE;

pub struct FramePool {
    base: FrameNo,
    used: Bitmap,
    data: Vec<u8>,
    stats: PfmStats,
}

impl FramePool {
    /// Pool com `count` frames numerados a partir de `base`
    pub fn new(base: FrameNo, count: usize) -> Self {
        Self {
            base,
            used: Bitmap::new(count),
            data: vec![0; count * PAGE_SIZE],
            stats: PfmStats::default(),
        }
    }

    pub fn stats(&self) -> PfmStats {
        self.stats
    }

    /// Frame pertence ao pool e está alocado?
    pub fn is_allocated(&self, frame: FrameNo) -> bool {
        self.index_of(frame).map_or(false, |i| self.used.test(i))
    }

    fn index_of(&self, frame: FrameNo) -> Option<usize> {
        let idx = frame.as_u64().checked_sub(self.base.as_u64())? as usize;
        (idx < self.used.len()).then_some(idx)
    }

    fn range(idx: usize) -> core::ops::Range<usize> {
        idx * PAGE_SIZE..(idx + 1) * PAGE_SIZE
    }
}

impl PhysMemory for FramePool {
    fn alloc_frame(&mut self) -> Option<FrameNo> {
        match self.used.find_first_zero() {
            Some(idx) => {
                self.used.set(idx);
                self.stats.allocations += 1;
                Some(self.base.offset(idx))
            }
            None => {
                self.stats.failed += 1;
                None
            }
        }
    }

    fn alloc_contiguous(&mut self, count: usize) -> Option<FrameNo> {
        match self.used.find_zero_run(count) {
            Some(start) => {
                for idx in start..start + count {
                    self.used.set(idx);
                }
                self.stats.allocations += count as u64;
                Some(self.base.offset(start))
            }
            None => {
                self.stats.failed += 1;
                None
            }
        }
    }

    fn free_frame(&mut self, frame: FrameNo) {
        match self.index_of(frame) {
            Some(idx) if self.used.test(idx) => {
                self.used.clear(idx);
                self.stats.frees += 1;
            }
            _ => crate::kwarn!("(PFM) free de frame não alocado=", frame.as_u64()),
        }
    }

    fn frame(&self, frame: FrameNo) -> Option<&[u8]> {
        let idx = self.index_of(frame)?;
        Some(&self.data[Self::range(idx)])
    }

    fn frame_mut(&mut self, frame: FrameNo) -> Option<&mut [u8]> {
        let idx = self.index_of(frame)?;
        Some(&mut self.data[Self::range(idx)])
    }

    fn free_frames(&self) -> usize {
        self.used.len() - self.used.count_ones()
    }

    fn total_frames(&self) -> usize {
        self.used.len()
    }

    fn copy_frame(&mut self, src: FrameNo, dst: FrameNo) -> bool {
        match (self.index_of(src), self.index_of(dst)) {
            (Some(s), Some(d)) => {
                self.data.copy_within(Self::range(s), d * PAGE_SIZE);
                true
            }
            _ => false,
        }
    }
}
