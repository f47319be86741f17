//! # Page Fault Handler
//!
//! Resolve faults em páginas de usuário:
//!
//! 1. Sem região no endereço: tenta crescer a stack, senão segfault.
//! 2. Acesso incompatível com a região: violação de proteção.
//! 3. Página ausente: demand load do binário ou frame zerado.
//! 4. Página no swap: swap-in.
//! 5. Escrita em página COW: cópia privada (ou posse, se for o último).
//! 6. Página presente: só refaz o mapeamento.
//!
//! Durante o I/O a thread que causou o fault fica bloqueada via [`IoWait`].
//! Nenhum erro daqui derruba o kernel; o chamador entrega o sinal ao processo.

use crate::mm::addr::{FrameNo, VirtAddr};
use crate::mm::config::{PAGE_MASK, PAGE_SIZE};
use crate::mm::error::{MmError, MmResult};
use crate::mm::io::{IoError, IoWait};
use crate::mm::region::{PageEntry, PageFlags, PageState, RegionId};
use crate::mm::vmm::Vmm;
use crate::sys::types::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

/// Como o fault foi resolvido
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Página lida do binário
    DemandLoaded,
    /// Página nova zerada
    ZeroFilled,
    /// Página lida do swap
    SwappedIn,
    /// Frame COW compartilhado copiado para um frame privado
    CowCopied,
    /// Último dono de um frame COW assumiu o frame
    CowReused,
    /// Página já estava presente; só o mapeamento foi refeito
    Remapped,
}

/// Fault que não pode ser resolvido (entregue ao processo)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultError {
    /// Nenhuma região cobre o endereço
    NoRegion,
    /// Acesso não permitido pela região
    ProtectionViolation,
    /// Sem frame mesmo após reclaim
    OutOfMemory,
    /// Falha lendo binário ou swap
    Io,
}

impl FaultError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRegion => "Falha de segmentação (sem região)",
            Self::ProtectionViolation => "Violação de proteção",
            Self::OutOfMemory => "OOM resolvendo fault",
            Self::Io => "Falha de I/O resolvendo fault",
        }
    }
}

impl core::fmt::Display for FaultError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<MmError> for FaultError {
    fn from(e: MmError) -> Self {
        match e {
            MmError::OutOfMemory => Self::OutOfMemory,
            MmError::Io => Self::Io,
            _ => Self::NoRegion,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageFaultInfo {
    pub addr: VirtAddr,
    pub ip: VirtAddr,
    pub error_code: u64,
    pub access: AccessType,
    pub user_mode: bool,
    /// Fault de proteção (página presente) e não de página ausente
    pub present: bool,
}

impl PageFaultInfo {
    /// Decodifica o error code do #PF (x86_64)
    pub fn from_error_code(addr: u64, ip: u64, error_code: u64) -> Self {
        let access = if error_code & 0x10 != 0 {
            AccessType::Execute
        } else if error_code & 0x02 != 0 {
            AccessType::Write
        } else {
            AccessType::Read
        };
        Self {
            addr: VirtAddr::new(addr),
            ip: VirtAddr::new(ip),
            error_code,
            access,
            user_mode: error_code & 0x04 != 0,
            present: error_code & 0x01 != 0,
        }
    }
}

impl Vmm {
    /// Resolve um page fault do processo `pid` em `addr`
    pub fn resolve_fault(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        access: AccessType,
        io: &dyn IoWait,
    ) -> Result<FaultAction, FaultError> {
        self.stats.faults += 1;
        #[cfg(feature = "mm_trace")]
        crate::ktrace!("(Fault) Resolvendo fault em ", addr.as_u64());

        let result = self.resolve(pid, addr, access, io);
        match result {
            Ok(_action) => {
                #[cfg(feature = "mm_trace")]
                crate::ktrace!("(Fault) Resolvido: ", _action as u8);
            }
            Err(e) => {
                self.stats.segfaults += 1;
                crate::kwarn!(e.as_str());
                crate::kwarn!("(Fault) Endereço: ", addr.as_u64());
            }
        }
        result
    }

    fn resolve(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        access: AccessType,
        io: &dyn IoWait,
    ) -> Result<FaultAction, FaultError> {
        let (_, vm, index) = match self.locate(pid, addr) {
            Some(found) => found,
            None => {
                self.grow_stack_to(pid, addr)
                    .map_err(|_| FaultError::NoRegion)?;
                self.locate(pid, addr).ok_or(FaultError::NoRegion)?
            }
        };
        let id = vm.region;

        let now = self.tick();
        let region = self.regions.get_mut(&id).ok_or(FaultError::NoRegion)?;
        if !region.flags().permits(access) {
            return Err(FaultError::ProtectionViolation);
        }
        region.timestamp = now;
        let entry = region.pages[index];

        match entry.state {
            PageState::Absent => self.fill_page(id, index, io),
            PageState::Swapped(_) => {
                self.with_reclaim(io, |vmm| vmm.swap_in(id, index, io))?;
                Ok(FaultAction::SwappedIn)
            }
            PageState::Present(frame) if access == AccessType::Write && entry.is_cow() => {
                self.break_cow(pid, id, index, frame, io)
            }
            PageState::Present(_) => {
                self.map_for_users(id, index);
                Ok(FaultAction::Remapped)
            }
        }
    }

    /// Primeira vez que a página é tocada
    fn fill_page(
        &mut self,
        id: RegionId,
        index: usize,
        io: &dyn IoWait,
    ) -> Result<FaultAction, FaultError> {
        let frame = self.alloc_frame_reclaiming(io)?;

        let region = self.regions.get(&id).ok_or(FaultError::NoRegion)?;
        let entry = region.pages[index];
        let channel = region.io_channel(index);
        let source = match (entry.flags.contains(PageFlags::DEMAND_LOAD), region.binary()) {
            (true, Some(bin)) => region.load_range(index).map(|range| (bin.file, range)),
            _ => None,
        };

        let action = match source {
            Some((file, (offset, len))) => {
                io.begin_io(channel);
                let read = match self.frames.frame_mut(frame) {
                    Some(buf) => {
                        buf.fill(0);
                        self.binaries.read(file, offset, &mut buf[..len])
                    }
                    None => Err(IoError::Device),
                };
                io.end_io(channel);
                if read.is_err() {
                    self.frames.free_frame(frame);
                    return Err(FaultError::Io);
                }
                self.stats.demand_loads += 1;
                FaultAction::DemandLoaded
            }
            None => {
                self.frames.zero_frame(frame);
                self.stats.zero_fills += 1;
                FaultAction::ZeroFilled
            }
        };

        if let Some(region) = self.regions.get_mut(&id) {
            region.pages[index] = PageEntry {
                state: PageState::Present(frame),
                flags: entry.flags - PageFlags::DEMAND_LOAD,
            };
        }
        self.map_for_users(id, index);
        Ok(action)
    }

    /// Escrita em página COW
    fn break_cow(
        &mut self,
        pid: Pid,
        id: RegionId,
        index: usize,
        frame: FrameNo,
        io: &dyn IoWait,
    ) -> Result<FaultAction, FaultError> {
        let (state, action) = if self.cow.sharers(frame) > 1 {
            let copy = self.alloc_frame_reclaiming(io)?;
            if !self.frames.copy_frame(frame, copy) {
                self.frames.free_frame(copy);
                return Err(FaultError::Io);
            }
            self.cow.release(frame);
            self.stats.cow_copies += 1;
            (PageState::Present(copy), FaultAction::CowCopied)
        } else {
            self.stats.cow_reuses += 1;
            (PageState::Present(frame), FaultAction::CowReused)
        };

        if let Some(region) = self.regions.get_mut(&id) {
            let page = &mut region.pages[index];
            page.state = state;
            page.flags.remove(PageFlags::COW);
        }
        self.map_for(pid, id, index);
        Ok(action)
    }

    /// Executa `op`; se faltar frame, expulsa uma vítima e tenta de novo
    pub(crate) fn with_reclaim<T>(
        &mut self,
        io: &dyn IoWait,
        mut op: impl FnMut(&mut Self) -> MmResult<T>,
    ) -> MmResult<T> {
        match op(self) {
            Err(MmError::OutOfMemory) if self.config.direct_reclaim => {
                if self.evict_pages(1, io) == 0 {
                    return Err(MmError::OutOfMemory);
                }
                self.stats.direct_reclaims += 1;
                crate::kdebug!("(Fault) Reclaim direto liberou um frame");
                op(self)
            }
            other => other,
        }
    }

    fn alloc_frame_reclaiming(&mut self, io: &dyn IoWait) -> MmResult<FrameNo> {
        self.with_reclaim(io, |vmm| vmm.frames.alloc_frame().ok_or(MmError::OutOfMemory))
    }

    // =========================================================================
    // CÓPIA ENTRE KERNEL E USUÁRIO
    // =========================================================================

    /// Copia `data` para o espaço do processo, resolvendo faults no caminho
    pub fn copy_to_user(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        data: &[u8],
        io: &dyn IoWait,
    ) -> Result<(), FaultError> {
        let mut done = 0;
        while done < data.len() {
            let cur = VirtAddr::new(addr.as_u64() + done as u64);
            let frame = self.touch(pid, cur, AccessType::Write, io)?;
            let offset = (cur.as_u64() & !PAGE_MASK) as usize;
            let n = (PAGE_SIZE - offset).min(data.len() - done);
            let buf = self.frames.frame_mut(frame).ok_or(FaultError::Io)?;
            buf[offset..offset + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// Copia do espaço do processo para `buf`, resolvendo faults no caminho
    pub fn copy_from_user(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        buf: &mut [u8],
        io: &dyn IoWait,
    ) -> Result<(), FaultError> {
        let mut done = 0;
        while done < buf.len() {
            let cur = VirtAddr::new(addr.as_u64() + done as u64);
            let frame = self.touch(pid, cur, AccessType::Read, io)?;
            let offset = (cur.as_u64() & !PAGE_MASK) as usize;
            let n = (PAGE_SIZE - offset).min(buf.len() - done);
            let data = self.frames.frame(frame).ok_or(FaultError::Io)?;
            buf[done..done + n].copy_from_slice(&data[offset..offset + n]);
            done += n;
        }
        Ok(())
    }

    /// Acesso como o MMU faria: usa o PTE se ele permite, senão resolve o
    /// fault e tenta de novo
    fn touch(
        &mut self,
        pid: Pid,
        addr: VirtAddr,
        access: AccessType,
        io: &dyn IoWait,
    ) -> Result<FrameNo, FaultError> {
        for _ in 0..2 {
            if let Some(pte) = self.translate(pid, addr) {
                let allowed = match access {
                    AccessType::Read => true,
                    AccessType::Write => pte.is_writable(),
                    AccessType::Execute => pte.is_executable(),
                };
                if allowed {
                    return Ok(pte.frame);
                }
            }
            self.resolve_fault(pid, addr, access, io)?;
        }
        Err(FaultError::ProtectionViolation)
    }
}
