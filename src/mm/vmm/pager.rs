//! Swap-out e swap-in de páginas individuais

use super::Vmm;
use crate::mm::error::{MmError, MmResult};
use crate::mm::io::IoWait;
use crate::mm::region::{PageFlags, PageState, RegionId};

impl Vmm {
    /// Grava a página `index` da região no swap e devolve o frame ao
    /// alocador. Só páginas presentes de regiões sem frames fixos podem
    /// sair; uma página COW só sai quando é a última dona do frame.
    pub fn swap_out(&mut self, id: RegionId, index: usize, io: &dyn IoWait) -> MmResult<()> {
        let region = self.regions.get(&id).ok_or(MmError::RegionNotFound)?;
        if !region.is_swappable(index, &self.cow) {
            return Err(MmError::InvalidPageState);
        }
        let frame = region
            .page(index)
            .and_then(|p| p.frame())
            .ok_or(MmError::InvalidPageState)?;
        let channel = region.io_channel(index);

        let slot = self.swap.alloc_slot().ok_or(MmError::SwapFull)?;
        io.begin_io(channel);
        let written = match self.frames.frame(frame) {
            Some(data) => self.swap.write(slot, data).map_err(MmError::from),
            None => Err(MmError::Io),
        };
        io.end_io(channel);
        if let Err(e) = written {
            self.swap.free_slot(slot);
            crate::kwarn!("(Swap) Falha gravando slot ", slot.0);
            return Err(e);
        }

        self.unmap_for_users(id, index);
        if let Some(region) = self.regions.get_mut(&id) {
            let page = &mut region.pages[index];
            page.state = PageState::Swapped(slot);
            // Exclusiva: volta do swap num frame privado
            page.flags.remove(PageFlags::COW);
        }
        self.frames.free_frame(frame);
        self.stats.swap_outs += 1;
        crate::ktrace!("(Swap) Página saiu para o slot ", slot.0);
        Ok(())
    }

    /// Traz de volta a página `index` da região e a mapeia em todos os
    /// usuários. O slot é liberado.
    pub fn swap_in(&mut self, id: RegionId, index: usize, io: &dyn IoWait) -> MmResult<()> {
        let region = self.regions.get(&id).ok_or(MmError::RegionNotFound)?;
        let slot = match region.page(index).map(|p| p.state) {
            Some(PageState::Swapped(slot)) => slot,
            _ => return Err(MmError::InvalidPageState),
        };
        let channel = region.io_channel(index);

        let frame = self.frames.alloc_frame().ok_or(MmError::OutOfMemory)?;
        io.begin_io(channel);
        let read = match self.frames.frame_mut(frame) {
            Some(buf) => self.swap.read(slot, buf).map_err(MmError::from),
            None => Err(MmError::Io),
        };
        io.end_io(channel);
        if let Err(e) = read {
            self.frames.free_frame(frame);
            crate::kwarn!("(Swap) Falha lendo slot ", slot.0);
            return Err(e);
        }

        self.swap.free_slot(slot);
        if let Some(region) = self.regions.get_mut(&id) {
            region.pages[index].state = PageState::Present(frame);
        }
        self.map_for_users(id, index);
        self.stats.swap_ins += 1;
        crate::ktrace!("(Swap) Página voltou do slot ", slot.0);
        Ok(())
    }
}
