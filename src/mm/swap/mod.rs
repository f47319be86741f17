//! # Swap Subsystem
//!
//! Backing store para páginas expulsas da memória.
//!
//! [`SwapSpace`] controla a ocupação dos slots (bitmap) e delega a leitura e
//! escrita a um [`SwapDevice`]. Sem dispositivo a área tem capacidade zero e
//! todo swap-out falha com `SwapFull`.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::klib::bitmap::Bitmap;
use crate::mm::config::PAGE_SIZE;
use crate::mm::io::IoError;

/// Slot de swap (índice no backing store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(pub u32);

impl SwapSlot {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dispositivo de swap (disco, partição, RAM)
pub trait SwapDevice {
    /// Quantidade de slots de uma página
    fn slots(&self) -> usize;

    fn read_slot(&mut self, slot: SwapSlot, buf: &mut [u8]) -> Result<(), IoError>;

    fn write_slot(&mut self, slot: SwapSlot, data: &[u8]) -> Result<(), IoError>;
}

/// Dispositivo de swap em RAM
pub struct MemSwapDevice {
    data: Vec<u8>,
    slots: usize,
    fail: Arc<AtomicBool>,
}

impl MemSwapDevice {
    pub fn new(slots: usize) -> Self {
        Self {
            data: vec![0; slots * PAGE_SIZE],
            slots,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Chave de injeção de falha: com `true` toda operação retorna
    /// `IoError::Device`. Pode ser mantida depois que o dispositivo é
    /// entregue ao VMM.
    pub fn fault_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }

    fn range(&self, slot: SwapSlot) -> Result<core::ops::Range<usize>, IoError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(IoError::Device);
        }
        if slot.index() >= self.slots {
            return Err(IoError::NotFound);
        }
        let start = slot.index() * PAGE_SIZE;
        Ok(start..start + PAGE_SIZE)
    }
}

impl SwapDevice for MemSwapDevice {
    fn slots(&self) -> usize {
        self.slots
    }

    fn read_slot(&mut self, slot: SwapSlot, buf: &mut [u8]) -> Result<(), IoError> {
        let range = self.range(slot)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_slot(&mut self, slot: SwapSlot, data: &[u8]) -> Result<(), IoError> {
        let range = self.range(slot)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

/// Estatísticas de swap
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SwapStats {
    pub pages_out: u64,
    pub pages_in: u64,
    pub io_errors: u64,
}

/// Área de swap
pub struct SwapSpace {
    device: Option<Box<dyn SwapDevice + Send>>,
    used: Bitmap,
    stats: SwapStats,
}

impl SwapSpace {
    pub fn new<D: SwapDevice + Send + 'static>(device: D) -> Self {
        let slots = device.slots();
        crate::kinfo!("(Swap) Área inicializada, slots=", slots);
        Self {
            device: Some(Box::new(device)),
            used: Bitmap::new(slots),
            stats: SwapStats::default(),
        }
    }

    /// Área sem dispositivo
    pub fn disabled() -> Self {
        Self {
            device: None,
            used: Bitmap::new(0),
            stats: SwapStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.device.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    pub fn free_slots(&self) -> usize {
        self.used.len() - self.used.count_ones()
    }

    pub fn stats(&self) -> SwapStats {
        self.stats
    }

    pub fn alloc_slot(&mut self) -> Option<SwapSlot> {
        let index = self.used.find_first_zero()?;
        self.used.set(index);
        Some(SwapSlot(index as u32))
    }

    pub fn free_slot(&mut self, slot: SwapSlot) {
        if slot.index() < self.used.len() && self.used.test(slot.index()) {
            self.used.clear(slot.index());
        } else {
            crate::kwarn!("(Swap) free_slot em slot livre: ", slot.0);
        }
    }

    pub fn is_used(&self, slot: SwapSlot) -> bool {
        slot.index() < self.used.len() && self.used.test(slot.index())
    }

    /// Grava uma página no slot
    pub fn write(&mut self, slot: SwapSlot, data: &[u8]) -> Result<(), IoError> {
        let device = self.device.as_mut().ok_or(IoError::NotFound)?;
        match device.write_slot(slot, data) {
            Ok(()) => {
                self.stats.pages_out += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.io_errors += 1;
                Err(e)
            }
        }
    }

    /// Lê a página guardada no slot
    pub fn read(&mut self, slot: SwapSlot, buf: &mut [u8]) -> Result<(), IoError> {
        let device = self.device.as_mut().ok_or(IoError::NotFound)?;
        match device.read_slot(slot, buf) {
            Ok(()) => {
                self.stats.pages_in += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.io_errors += 1;
                Err(e)
            }
        }
    }
}
