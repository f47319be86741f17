use crate::mm::config::{PAGE_MASK, PAGE_SIZE};
use core::fmt;

/// Endereço virtual (wrapper type-safe)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(u64);

impl VirtAddr {
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Início da página que contém este endereço
    #[inline]
    pub const fn page_base(self) -> Self {
        Self(self.0 & PAGE_MASK)
    }

    /// Número da página virtual
    #[inline]
    pub const fn page_number(self) -> u64 {
        self.0 / PAGE_SIZE as u64
    }

    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.0 & !PAGE_MASK == 0
    }

    /// Adiciona `pages` páginas
    #[inline]
    pub const fn add_pages(self, pages: usize) -> Self {
        Self(self.0 + (pages * PAGE_SIZE) as u64)
    }

    /// Subtrai `pages` páginas
    #[inline]
    pub const fn sub_pages(self, pages: usize) -> Self {
        Self(self.0 - (pages * PAGE_SIZE) as u64)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#x})", self.0)
    }
}

impl fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
