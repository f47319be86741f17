//! Crescimento de regiões (data, dldata, stacks)

use alloc::vec::Vec;

use super::add::{stack_slot_of, stack_slot_range};
use super::Vmm;
use crate::mm::addr::VirtAddr;
use crate::mm::config::{FREE_AREA_BEGIN, FREE_AREA_END, MAX_STACK_PAGES, PAGE_SIZE};
use crate::mm::error::{MmError, MmResult};
use crate::mm::region::{PageEntry, RegionFlags, RegionType};
use crate::sys::types::Pid;

impl Vmm {
    /// Aumenta (`delta > 0`) ou diminui (`delta < 0`) a região em páginas.
    /// Devolve o tamanho anterior em páginas.
    ///
    /// Stacks que crescem para baixo ganham e perdem páginas no início; o
    /// endereço da região muda junto.
    pub fn grow(&mut self, pid: Pid, rno: usize, delta: isize) -> MmResult<usize> {
        let vm = self.vm_region(pid, rno).ok_or(MmError::RegionNotFound)?;
        let region = self.regions.get(&vm.region).ok_or(MmError::RegionNotFound)?;
        if !region.flags().contains(RegionFlags::GROWABLE) || region.users().len() > 1 {
            return Err(MmError::NotGrowable);
        }
        let old = region.page_count();
        let down = region.flags().contains(RegionFlags::GROWS_DOWN);
        let kind = region.kind();
        let start = vm.virt.as_u64();
        let end = start + (old * PAGE_SIZE) as u64;

        if delta == 0 {
            return Ok(old);
        }

        if delta > 0 {
            let n = delta as usize;
            let size = (n * PAGE_SIZE) as u64;
            let (lo, hi) = if down {
                (start.checked_sub(size).ok_or(MmError::NoVirtualSpace)?, start)
            } else {
                (end, end.checked_add(size).ok_or(MmError::NoVirtualSpace)?)
            };

            let fits = match kind {
                RegionType::Stack | RegionType::StackUp => {
                    let slot = stack_slot_of(start).ok_or(MmError::NoVirtualSpace)?;
                    let (base, top) = stack_slot_range(slot);
                    old + n <= MAX_STACK_PAGES && lo >= base && hi <= top
                }
                RegionType::Data => hi <= FREE_AREA_BEGIN,
                _ => hi <= FREE_AREA_END,
            };
            if !fits || !self.range_is_free(pid, lo, hi, Some(rno)) {
                return Err(MmError::NoVirtualSpace);
            }

            if let Some(region) = self.regions.get_mut(&vm.region) {
                if down {
                    let mut pages = alloc::vec![PageEntry::ABSENT; n];
                    pages.append(&mut region.pages);
                    region.pages = pages;
                } else {
                    region.pages.resize(old + n, PageEntry::ABSENT);
                }
            }
            if down {
                if let Some(vm) = self.spaces.get_mut(&pid).and_then(|s| s.get_mut(rno)) {
                    vm.virt = VirtAddr::new(lo);
                }
            }
            crate::ktrace!("(VMM) Região cresceu, páginas=", old + n);
            return Ok(old);
        }

        let n = delta.unsigned_abs();
        if n > old {
            return Err(MmError::InvalidSize);
        }
        let (first, removed): (usize, Vec<PageEntry>) = match self.regions.get_mut(&vm.region) {
            Some(region) if down => (0, region.pages.drain(0..n).collect()),
            Some(region) => (old - n, region.pages.drain(old - n..).collect()),
            None => return Err(MmError::RegionNotFound),
        };
        let flags = self
            .regions
            .get(&vm.region)
            .map_or(RegionFlags::empty(), |r| r.flags());

        if let Some(space) = self.spaces.get_mut(&pid) {
            space.page_dir.unmap_range(vm.virt.add_pages(first), n);
            if down {
                if let Some(vm) = space.get_mut(rno) {
                    vm.virt = vm.virt.add_pages(n);
                }
            }
        }
        for entry in removed {
            self.release_page(flags, entry);
        }
        crate::ktrace!("(VMM) Região encolheu, páginas=", old - n);
        Ok(old)
    }

    /// Cresce a stack do processo até cobrir `addr`.
    ///
    /// Só stacks que crescem para baixo crescem por fault, e apenas dentro do
    /// próprio slot. Devolve o número da stack.
    pub fn grow_stack_to(&mut self, pid: Pid, addr: VirtAddr) -> MmResult<usize> {
        let slot = stack_slot_of(addr.as_u64()).ok_or(MmError::RegionNotFound)?;
        let space = self.spaces.get(&pid).ok_or(MmError::NoSuchProcess)?;
        let (rno, vm) = space
            .iter()
            .find(|(_, vm)| {
                stack_slot_of(vm.virt.as_u64()) == Some(slot)
                    && self
                        .regions
                        .get(&vm.region)
                        .is_some_and(|r| r.flags().contains(RegionFlags::GROWS_DOWN))
            })
            .map(|(rno, vm)| (rno, *vm))
            .ok_or(MmError::RegionNotFound)?;

        let target = addr.page_base().as_u64();
        if target >= vm.virt.as_u64() {
            return Ok(rno);
        }
        let needed = ((vm.virt.as_u64() - target) / PAGE_SIZE as u64) as usize;
        self.grow(pid, rno, needed as isize)?;
        crate::kdebug!("(VMM) Stack cresceu até ", target);
        Ok(rno)
    }
}
