//! Compartilhamento de regiões: `join` (SHM) e `clone_all` (fork)

use alloc::vec::Vec;

use super::Vmm;
use crate::mm::aspace::{AddressSpace, VmRegion};
use crate::mm::config::{FREE_AREA_BEGIN, FREE_AREA_END};
use crate::mm::error::{MmError, MmResult};
use crate::mm::region::{PageEntry, PageFlags, PageState, Region, RegionType};
use crate::sys::types::Pid;

impl Vmm {
    /// Liga a região de memória compartilhada `rno` de `src` ao processo
    /// `dst`. Devolve o número da região em `dst`.
    pub fn join(&mut self, src: Pid, rno: usize, dst: Pid) -> MmResult<usize> {
        let vm = self.vm_region(src, rno).ok_or(MmError::RegionNotFound)?;
        let region = self.regions.get(&vm.region).ok_or(MmError::RegionNotFound)?;
        if region.kind() != RegionType::Shm {
            return Err(MmError::NotShareable);
        }
        let size = region.byte_len() as u64;

        let space = self.spaces.get(&dst).ok_or(MmError::NoSuchProcess)?;
        if let Some(existing) = space.rno_of(vm.region) {
            return Ok(existing);
        }
        let dst_rno = space.free_rno().ok_or(MmError::NoFreeSlot)?;
        let virt = self
            .first_fit(dst, size, FREE_AREA_BEGIN, FREE_AREA_END)
            .ok_or(MmError::NoVirtualSpace)?;

        if let Some(region) = self.regions.get_mut(&vm.region) {
            region.add_user(dst);
        }
        if let Some(space) = self.spaces.get_mut(&dst) {
            space.set(
                dst_rno,
                VmRegion {
                    region: vm.region,
                    virt: crate::mm::addr::VirtAddr::new(virt),
                },
            );
        }
        self.map_region_into(dst, dst_rno);

        crate::kdebug!("(VMM) SHM compartilhada com pid=", dst.as_u32());
        Ok(dst_rno)
    }

    /// Copia o espaço de endereçamento de `src` para `dst` (fork).
    ///
    /// Regiões compartilháveis são ligadas ao filho; regiões privadas são
    /// copiadas com copy-on-write. Páginas no swap são lidas de volta para
    /// um frame próprio do filho. Em caso de falha o espaço do filho é
    /// desfeito.
    pub fn clone_all(&mut self, src: Pid, dst: Pid) -> MmResult<()> {
        let entries: Vec<(usize, VmRegion)> = self
            .spaces
            .get(&src)
            .ok_or(MmError::NoSuchProcess)?
            .iter()
            .map(|(rno, vm)| (rno, *vm))
            .collect();

        match self.spaces.get(&dst) {
            Some(space) if !space.is_empty() => return Err(MmError::ProcessExists),
            Some(_) => {}
            None => {
                self.spaces.insert(dst, AddressSpace::new(dst));
            }
        }

        for (rno, vm) in entries {
            if let Err(e) = self.clone_region(src, dst, rno, vm) {
                crate::kwarn!("(VMM) clone_all falhou, desfazendo pid=", dst.as_u32());
                let _ = self.remove_all(dst);
                return Err(e);
            }
        }

        crate::kdebug!("(VMM) Espaço clonado para pid=", dst.as_u32());
        Ok(())
    }

    fn clone_region(&mut self, src: Pid, dst: Pid, rno: usize, vm: VmRegion) -> MmResult<()> {
        let region = self.regions.get_mut(&vm.region).ok_or(MmError::RegionNotFound)?;

        if region.kind().is_shared_on_clone() {
            region.add_user(dst);
            if let Some(space) = self.spaces.get_mut(&dst) {
                space.set(rno, vm);
            }
            self.map_region_into(dst, rno);
            return Ok(());
        }

        // Região privada: o filho recebe uma cópia com páginas ausentes que é
        // preenchida página a página, para que uma falha no meio seja
        // desfeita por remove_all.
        let count = region.page_count();
        let kind = region.kind;
        let flags = region.flags;
        let binary = region.binary;
        let timestamp = region.timestamp;

        let id = self.alloc_region_id();
        let mut child = Region::new(id, kind, binary, 0, dst);
        child.flags = flags;
        child.timestamp = timestamp;
        child.pages = alloc::vec![PageEntry::ABSENT; count];
        self.regions.insert(id, child);
        if let Some(space) = self.spaces.get_mut(&dst) {
            space.set(rno, VmRegion { region: id, virt: vm.virt });
        }

        for index in 0..count {
            let Some(entry) = self.regions.get(&vm.region).and_then(|r| r.page(index).copied())
            else {
                break;
            };
            let child_entry = match entry.state {
                PageState::Absent => entry,
                PageState::Present(frame) => {
                    self.cow.share(frame);
                    if let Some(parent) = self.regions.get_mut(&vm.region) {
                        parent.pages[index].flags.insert(PageFlags::COW);
                    }
                    // Pai perde a escrita até o próximo fault
                    self.map_for(src, vm.region, index);
                    PageEntry {
                        state: entry.state,
                        flags: entry.flags | PageFlags::COW,
                    }
                }
                PageState::Swapped(slot) => {
                    let frame = self.frames.alloc_frame().ok_or(MmError::OutOfMemory)?;
                    let read = match self.frames.frame_mut(frame) {
                        Some(buf) => self.swap.read(slot, buf).map_err(MmError::from),
                        None => Err(MmError::Io),
                    };
                    if let Err(e) = read {
                        self.frames.free_frame(frame);
                        return Err(e);
                    }
                    PageEntry {
                        state: PageState::Present(frame),
                        flags: entry.flags,
                    }
                }
            };
            if let Some(child) = self.regions.get_mut(&id) {
                child.pages[index] = child_entry;
            }
        }

        self.map_region_into(dst, rno);
        Ok(())
    }
}
