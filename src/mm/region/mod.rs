//! # Regiões de Memória
//!
//! Uma região é um intervalo de páginas com tipo, proteção e estado por
//! página. Ela não tem endereço próprio: cada processo que a usa a liga a um
//! endereço virtual através de um [`VmRegion`](crate::mm::aspace::VmRegion).
//!
//! ## Estado por página
//!
//! ```text
//!   Absent ──fault──► Present(frame) ──swap-out──► Swapped(slot)
//!                          ▲                            │
//!                          └──────────swap-in───────────┘
//! ```
//!
//! `COW` e `DEMAND_LOAD` são ortogonais ao estado.
//!
//! Regiões compartilhadas (text, shm, device) guardam a lista de processos
//! que as usam; a região morre junto com o último usuário.

use alloc::vec::Vec;

use crate::klib::div_ceil;
use crate::mm::addr::FrameNo;
use crate::mm::config::PAGE_SIZE;
use crate::mm::fault::AccessType;
use crate::mm::pfm::CowTracker;
use crate::mm::swap::SwapSlot;
use crate::mm::vmm::mapper::MapFlags;
use crate::sys::types::{FileId, FileOffset, Pid};

/// Identificador global de região
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub u64);

/// Tipo (intenção) da região
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionType {
    Text,
    Rodata,
    Data,
    /// Stack que cresce para baixo
    Stack,
    /// Stack que cresce para cima
    StackUp,
    Shm,
    Device,
    Tls,
    ShlibText,
    ShlibData,
    /// Dados de biblioteca carregada dinamicamente
    DlData,
    /// Memória física contígua (DMA)
    Phys,
}

impl RegionType {
    /// Flags com que uma região deste tipo nasce
    pub fn default_flags(self) -> RegionFlags {
        match self {
            Self::Text | Self::ShlibText => RegionFlags::SHAREABLE | RegionFlags::EXECUTABLE,
            Self::Rodata => RegionFlags::SHAREABLE,
            Self::Data | Self::DlData => RegionFlags::WRITABLE | RegionFlags::GROWABLE,
            Self::Stack => {
                RegionFlags::WRITABLE
                    | RegionFlags::GROWABLE
                    | RegionFlags::GROWS_DOWN
                    | RegionFlags::STACK
            }
            Self::StackUp => RegionFlags::WRITABLE | RegionFlags::GROWABLE | RegionFlags::STACK,
            Self::Shm => RegionFlags::SHAREABLE | RegionFlags::WRITABLE,
            Self::Device => RegionFlags::SHAREABLE | RegionFlags::WRITABLE | RegionFlags::NOFREE,
            Self::Tls => RegionFlags::WRITABLE | RegionFlags::TLS,
            Self::ShlibData | Self::Phys => RegionFlags::WRITABLE,
        }
    }

    /// Número de região fixo (text, rodata, data)
    pub fn fixed_rno(self) -> Option<usize> {
        use crate::mm::config::{RNO_DATA, RNO_RODATA, RNO_TEXT};
        match self {
            Self::Text => Some(RNO_TEXT),
            Self::Rodata => Some(RNO_RODATA),
            Self::Data => Some(RNO_DATA),
            _ => None,
        }
    }

    pub fn is_stack(self) -> bool {
        matches!(self, Self::Stack | Self::StackUp)
    }

    /// Regiões que `clone_all` liga ao filho em vez de copiar
    pub fn is_shared_on_clone(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Rodata | Self::ShlibText | Self::Shm | Self::Device | Self::Phys
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Rodata => "rodata",
            Self::Data => "data",
            Self::Stack => "stack",
            Self::StackUp => "stackup",
            Self::Shm => "shm",
            Self::Device => "device",
            Self::Tls => "tls",
            Self::ShlibText => "shlibtext",
            Self::ShlibData => "shlibdata",
            Self::DlData => "dldata",
            Self::Phys => "phys",
        }
    }
}

bitflags::bitflags! {
    /// Flags de região
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionFlags: u32 {
        const WRITABLE = 1 << 0;
        const EXECUTABLE = 1 << 1;
        const SHAREABLE = 1 << 2;
        const GROWABLE = 1 << 3;
        const GROWS_DOWN = 1 << 4;
        const STACK = 1 << 5;
        const TLS = 1 << 6;
        /// Frames não pertencem à região (nunca liberados nem expulsos)
        const NOFREE = 1 << 7;
    }
}

impl RegionFlags {
    /// Verifica se a região permite o tipo de acesso
    pub fn permits(self, access: AccessType) -> bool {
        match access {
            AccessType::Read => true,
            AccessType::Write => self.contains(Self::WRITABLE),
            AccessType::Execute => self.contains(Self::EXECUTABLE),
        }
    }
}

bitflags::bitflags! {
    /// Flags por página
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u8 {
        /// Frame compartilhado após fork; escrita exige cópia
        const COW = 1 << 0;
        /// Conteúdo vem do binário no primeiro acesso
        const DEMAND_LOAD = 1 << 1;
    }
}

/// Onde está o conteúdo de uma página
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Absent,
    Present(FrameNo),
    Swapped(SwapSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub state: PageState,
    pub flags: PageFlags,
}

impl PageEntry {
    pub const ABSENT: Self = Self {
        state: PageState::Absent,
        flags: PageFlags::empty(),
    };

    #[inline]
    pub fn frame(&self) -> Option<FrameNo> {
        match self.state {
            PageState::Present(frame) => Some(frame),
            _ => None,
        }
    }

    #[inline]
    pub fn is_cow(&self) -> bool {
        self.flags.contains(PageFlags::COW)
    }
}

/// Descrição do binário de onde a região é carregada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinDesc {
    pub file: FileId,
    pub offset: FileOffset,
    /// Bytes carregados do arquivo; o resto da região começa zerado
    pub load_bytes: usize,
}

/// Região de memória
#[derive(Debug)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) kind: RegionType,
    pub(crate) flags: RegionFlags,
    pub(crate) binary: Option<BinDesc>,
    pub(crate) pages: Vec<PageEntry>,
    pub(crate) users: Vec<Pid>,
    /// Último acesso (relógio lógico do VMM)
    pub(crate) timestamp: u64,
}

impl Region {
    /// Cria região com `pages` páginas ausentes para o primeiro usuário
    pub fn new(
        id: RegionId,
        kind: RegionType,
        binary: Option<BinDesc>,
        bytes: usize,
        owner: Pid,
    ) -> Self {
        let count = div_ceil(bytes, PAGE_SIZE);
        let mut entry = PageEntry::ABSENT;
        if binary.is_some() {
            entry.flags = PageFlags::DEMAND_LOAD;
        }
        let mut users = Vec::new();
        users.push(owner);
        Self {
            id,
            kind,
            flags: kind.default_flags(),
            binary,
            pages: alloc::vec![entry; count],
            users,
            timestamp: 0,
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn kind(&self) -> RegionType {
        self.kind
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    pub fn binary(&self) -> Option<&BinDesc> {
        self.binary.as_ref()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn byte_len(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    pub fn page(&self, index: usize) -> Option<&PageEntry> {
        self.pages.get(index)
    }

    pub fn users(&self) -> &[Pid] {
        &self.users
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_used_by(&self, pid: Pid) -> bool {
        self.users.contains(&pid)
    }

    pub(crate) fn add_user(&mut self, pid: Pid) {
        if !self.users.contains(&pid) {
            self.users.push(pid);
        }
    }

    /// Remove um usuário. Devolve quantos restam.
    pub(crate) fn remove_user(&mut self, pid: Pid) -> usize {
        self.users.retain(|&p| p != pid);
        self.users.len()
    }

    /// Página pode ir para o swap: presente, região sem frames fixos
    /// (NOFREE) e que não seja memória física contígua. Página COW só sai se
    /// o frame não é mais compartilhado (`cow` não o rastreia).
    pub fn is_swappable(&self, index: usize, cow: &CowTracker) -> bool {
        if self.flags.contains(RegionFlags::NOFREE) || self.kind == RegionType::Phys {
            return false;
        }
        match self.pages.get(index).map(|e| (e.state, e.is_cow())) {
            Some((PageState::Present(frame), is_cow)) => !is_cow || cow.sharers(frame) == 0,
            _ => false,
        }
    }

    pub fn swappable_pages<'a>(&'a self, cow: &'a CowTracker) -> impl Iterator<Item = usize> + 'a {
        (0..self.pages.len()).filter(move |&i| self.is_swappable(i, cow))
    }

    pub fn has_swappable_pages(&self, cow: &CowTracker) -> bool {
        self.swappable_pages(cow).next().is_some()
    }

    /// Páginas residentes (com frame)
    pub fn resident_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.frame().is_some()).count()
    }

    pub fn swapped_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.state, PageState::Swapped(_)))
            .count()
    }

    /// Trecho do binário que cai na página `index`: (offset, bytes).
    /// `None` se a página está além dos bytes carregáveis.
    pub fn load_range(&self, index: usize) -> Option<(FileOffset, usize)> {
        let bin = self.binary.as_ref()?;
        let start = index * PAGE_SIZE;
        if start >= bin.load_bytes {
            return None;
        }
        let len = (bin.load_bytes - start).min(PAGE_SIZE);
        Some((bin.offset + start as FileOffset, len))
    }

    /// Flags de mapeamento de uma página desta região
    pub fn map_flags(&self, entry: &PageEntry) -> MapFlags {
        let mut flags = MapFlags::PRESENT | MapFlags::USER;
        if self.flags.contains(RegionFlags::WRITABLE) && !entry.is_cow() {
            flags |= MapFlags::WRITABLE;
        }
        if !self.flags.contains(RegionFlags::EXECUTABLE) {
            flags |= MapFlags::NO_EXECUTE;
        }
        if self.kind == RegionType::Device {
            flags |= MapFlags::NO_CACHE;
        }
        flags
    }

    /// Canal de espera do I/O de uma página
    pub fn io_channel(&self, index: usize) -> u64 {
        (self.id.0 << 32) | index as u64
    }
}
