//! Criação de regiões e posicionamento no espaço virtual

use alloc::vec::Vec;

use super::Vmm;
use crate::mm::addr::{FrameNo, VirtAddr};
use crate::mm::aspace::VmRegion;
use crate::mm::config::{
    FREE_AREA_BEGIN, FREE_AREA_END, MAX_STACK_PAGES, PAGE_SIZE, RNO_DATA, RNO_RODATA, RNO_TEXT,
    STACK_AREA_BEGIN, STACK_AREA_END, STACK_SLOT_SIZE, TEXT_BEGIN,
};
use crate::mm::error::{MmError, MmResult};
use crate::mm::region::{BinDesc, PageEntry, PageFlags, PageState, Region, RegionFlags, RegionType};
use crate::sys::types::Pid;

/// Slot de stack que contém `addr`
pub(crate) fn stack_slot_of(addr: u64) -> Option<u64> {
    if !(STACK_AREA_BEGIN..STACK_AREA_END).contains(&addr) {
        return None;
    }
    let slot = (STACK_AREA_END - 1 - addr) / STACK_SLOT_SIZE;
    (STACK_AREA_END - (slot + 1) * STACK_SLOT_SIZE >= STACK_AREA_BEGIN).then_some(slot)
}

/// `[base, topo)` do slot de stack
pub(crate) fn stack_slot_range(slot: u64) -> (u64, u64) {
    let top = STACK_AREA_END - slot * STACK_SLOT_SIZE;
    (top - STACK_SLOT_SIZE, top)
}

impl Vmm {
    /// Adiciona uma região ao processo e devolve seu número.
    ///
    /// Regiões de texto carregadas do mesmo binário são compartilhadas entre
    /// processos em vez de carregadas de novo.
    pub fn add(
        &mut self,
        pid: Pid,
        binary: Option<BinDesc>,
        bytes: usize,
        kind: RegionType,
    ) -> MmResult<usize> {
        if matches!(kind, RegionType::Device | RegionType::Phys) {
            // Memória física entra por add_phys
            return Err(MmError::InvalidParameter);
        }
        if bytes == 0 {
            return Err(MmError::InvalidSize);
        }
        let pages = bytes.div_ceil(PAGE_SIZE);
        if kind.is_stack() && pages > MAX_STACK_PAGES {
            return Err(MmError::InvalidSize);
        }
        let space = self.spaces.get(&pid).ok_or(MmError::NoSuchProcess)?;
        self.check_order(pid, kind)?;

        let rno = match kind.fixed_rno() {
            Some(rno) => rno,
            None => space.free_rno().ok_or(MmError::NoFreeSlot)?,
        };
        let virt = self.place(pid, kind, pages)?;

        let shared = binary.and_then(|bin| self.find_shared_text(kind, &bin, pages));
        let id = match shared {
            Some(id) => {
                if let Some(region) = self.regions.get_mut(&id) {
                    region.add_user(pid);
                }
                crate::kdebug!("(VMM) Texto compartilhado, região=", id.0);
                id
            }
            None => {
                let id = self.alloc_region_id();
                let mut region = Region::new(id, kind, binary, bytes, pid);
                region.timestamp = self.tick();
                self.regions.insert(id, region);
                id
            }
        };

        if let Some(space) = self.spaces.get_mut(&pid) {
            space.set(rno, VmRegion { region: id, virt });
        }
        self.map_region_into(pid, rno);

        crate::ktrace!("(VMM) Região adicionada, rno=", rno);
        crate::ktrace!(kind.as_str());
        Ok(rno)
    }

    /// Adiciona memória física contígua ao processo.
    ///
    /// Com `phys` a região cobre frames já existentes (device, framebuffer) e
    /// nunca os libera. Sem `phys` os frames são alocados agora, ficam fixos
    /// (não vão para o swap) e voltam ao alocador junto com a região.
    pub fn add_phys(&mut self, pid: Pid, phys: Option<FrameNo>, bytes: usize) -> MmResult<usize> {
        if bytes == 0 {
            return Err(MmError::InvalidSize);
        }
        let pages = bytes.div_ceil(PAGE_SIZE);
        let space = self.spaces.get(&pid).ok_or(MmError::NoSuchProcess)?;
        let rno = space.free_rno().ok_or(MmError::NoFreeSlot)?;
        let virt = self.place(pid, RegionType::Phys, pages)?;

        let (kind, base) = match phys {
            Some(base) => (RegionType::Device, base),
            None => {
                let base = self
                    .frames
                    .alloc_contiguous(pages)
                    .ok_or(MmError::OutOfMemory)?;
                (RegionType::Phys, base)
            }
        };

        let id = self.alloc_region_id();
        let mut region = Region::new(id, kind, None, bytes, pid);
        for (i, entry) in region.pages.iter_mut().enumerate() {
            *entry = PageEntry {
                state: PageState::Present(base.offset(i)),
                flags: PageFlags::empty(),
            };
        }
        region.timestamp = self.tick();
        self.regions.insert(id, region);
        if let Some(space) = self.spaces.get_mut(&pid) {
            space.set(rno, VmRegion { region: id, virt });
        }
        self.map_region_into(pid, rno);

        crate::kdebug!("(VMM) Memória física mapeada em ", virt.as_u64());
        Ok(rno)
    }

    /// Liga ou desliga escrita em uma região do processo
    pub fn set_reg_prot(&mut self, pid: Pid, rno: usize, writable: bool) -> MmResult<()> {
        let vm = self.vm_region(pid, rno).ok_or(MmError::RegionNotFound)?;
        let region = self
            .regions
            .get_mut(&vm.region)
            .ok_or(MmError::RegionNotFound)?;

        let locked = region.kind.is_stack()
            || matches!(
                region.kind,
                RegionType::Tls | RegionType::Device | RegionType::Phys
            )
            || region.users.len() > 1;
        if locked {
            return Err(MmError::ProtectionLocked);
        }

        region.flags.set(RegionFlags::WRITABLE, writable);
        let count = region.page_count();
        for index in 0..count {
            self.map_for_users(vm.region, index);
        }
        Ok(())
    }

    // =========================================================================
    // POSICIONAMENTO
    // =========================================================================

    /// text → rodata → data, nessa ordem relativa
    fn check_order(&self, pid: Pid, kind: RegionType) -> MmResult<()> {
        let exists = |rno| self.exists(pid, rno);
        let later: &[usize] = match kind {
            RegionType::Text => &[RNO_RODATA, RNO_DATA],
            RegionType::Rodata => &[RNO_DATA],
            RegionType::Data => &[],
            _ => return Ok(()),
        };
        if let Some(rno) = kind.fixed_rno() {
            if exists(rno) {
                return Err(MmError::RegionExists);
            }
        }
        if later.iter().any(|&rno| exists(rno)) {
            return Err(MmError::InvalidRegionOrder);
        }
        Ok(())
    }

    /// Escolhe o endereço de uma nova região
    fn place(&self, pid: Pid, kind: RegionType, pages: usize) -> MmResult<VirtAddr> {
        let size = (pages * PAGE_SIZE) as u64;
        match kind {
            RegionType::Text | RegionType::Rodata | RegionType::Data => {
                let start = [RNO_DATA, RNO_RODATA, RNO_TEXT]
                    .iter()
                    .filter_map(|&rno| self.reg_range(pid, rno))
                    .map(|(_, end)| end.as_u64())
                    .max()
                    .unwrap_or(TEXT_BEGIN);
                let end = start.checked_add(size).ok_or(MmError::NoVirtualSpace)?;
                if end > FREE_AREA_BEGIN {
                    return Err(MmError::NoVirtualSpace);
                }
                if !self.range_is_free(pid, start, end, None) {
                    return Err(MmError::RegionOverlap);
                }
                Ok(VirtAddr::new(start))
            }
            RegionType::Stack | RegionType::StackUp => {
                let slot = self.free_stack_slot(pid).ok_or(MmError::NoVirtualSpace)?;
                let (base, top) = stack_slot_range(slot);
                if kind == RegionType::Stack {
                    Ok(VirtAddr::new(top - size))
                } else {
                    Ok(VirtAddr::new(base))
                }
            }
            _ => self
                .first_fit(pid, size, FREE_AREA_BEGIN, FREE_AREA_END)
                .map(VirtAddr::new)
                .ok_or(MmError::NoVirtualSpace),
        }
    }

    /// Primeiro buraco de `size` bytes em `[lo, hi)`
    pub(crate) fn first_fit(&self, pid: Pid, size: u64, lo: u64, hi: u64) -> Option<u64> {
        let space = self.spaces.get(&pid)?;
        let mut used: Vec<(u64, u64)> = space
            .iter()
            .map(|(_, vm)| self.span(vm))
            .filter(|&(s, e)| e > lo && s < hi)
            .collect();
        used.sort_unstable();

        let mut cursor = lo;
        for (start, end) in used {
            if start >= cursor && start - cursor >= size {
                return Some(cursor);
            }
            cursor = cursor.max(end);
        }
        (hi.saturating_sub(cursor) >= size).then_some(cursor)
    }

    /// Primeiro slot de stack sem nenhuma região
    fn free_stack_slot(&self, pid: Pid) -> Option<u64> {
        let space = self.spaces.get(&pid)?;
        let mut used: Vec<u64> = space
            .iter()
            .filter_map(|(_, vm)| stack_slot_of(vm.virt.as_u64()))
            .collect();
        used.sort_unstable();
        used.dedup();

        let mut slot = 0;
        for taken in used {
            if taken != slot {
                break;
            }
            slot += 1;
        }
        stack_slot_of(stack_slot_range(slot).0).map(|_| slot)
    }

    /// Região de texto já carregada do mesmo binário, com o mesmo tamanho
    fn find_shared_text(
        &self,
        kind: RegionType,
        bin: &BinDesc,
        pages: usize,
    ) -> Option<crate::mm::region::RegionId> {
        if !matches!(kind, RegionType::Text | RegionType::ShlibText) {
            return None;
        }
        self.regions
            .values()
            .find(|r| {
                r.kind == kind
                    && r.page_count() == pages
                    && r.binary().is_some_and(|b| b.file == bin.file && b.offset == bin.offset)
            })
            .map(|r| r.id())
    }
}
