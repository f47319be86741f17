//! Mapper: tabela de páginas de um processo
//!
//! Modelo em software da hierarquia PML4 → PT: cada página virtual mapeada
//! aponta para um frame com [`MapFlags`]. A troca para a tabela real do
//! hardware é feita pela camada de arquitetura a partir deste modelo.

use alloc::collections::BTreeMap;

use crate::mm::addr::{FrameNo, VirtAddr};

bitflags::bitflags! {
    /// Flags de mapeamento de página (Paging Flags)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u64 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        const GLOBAL = 1 << 8;
        const NO_EXECUTE = 1 << 63;
    }
}

/// Entrada de tabela de páginas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pte {
    pub frame: FrameNo,
    pub flags: MapFlags,
}

impl Pte {
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(MapFlags::WRITABLE)
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        !self.flags.contains(MapFlags::NO_EXECUTE)
    }
}

/// Tabela de páginas (página virtual → PTE)
#[derive(Debug, Default)]
pub struct PageDir {
    entries: BTreeMap<u64, Pte>,
}

impl PageDir {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Mapeia a página que contém `virt`. Devolve a entrada anterior, se havia.
    pub fn map(&mut self, virt: VirtAddr, frame: FrameNo, flags: MapFlags) -> Option<Pte> {
        self.entries.insert(
            virt.page_number(),
            Pte {
                frame,
                flags: flags | MapFlags::PRESENT,
            },
        )
    }

    pub fn unmap(&mut self, virt: VirtAddr) -> Option<Pte> {
        self.entries.remove(&virt.page_number())
    }

    /// Remove `pages` páginas a partir de `start`
    pub fn unmap_range(&mut self, start: VirtAddr, pages: usize) {
        for i in 0..pages {
            self.entries.remove(&start.add_pages(i).page_number());
        }
    }

    pub fn translate(&self, virt: VirtAddr) -> Option<Pte> {
        self.entries.get(&virt.page_number()).copied()
    }

    pub fn is_mapped(&self, virt: VirtAddr) -> bool {
        self.entries.contains_key(&virt.page_number())
    }

    /// Páginas mapeadas
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
