use core::fmt;

/// Número de frame físico (endereço físico / PAGE_SIZE)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameNo(pub u64);

impl FrameNo {
    #[inline]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn offset(self, n: usize) -> Self {
        Self(self.0 + n as u64)
    }
}

impl fmt::Debug for FrameNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameNo({:#x})", self.0)
    }
}
