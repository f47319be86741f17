//! Remoção de regiões e destruição de espaços de endereçamento

use alloc::vec::Vec;

use super::Vmm;
use crate::mm::error::{MmError, MmResult};
use crate::sys::types::Pid;

impl Vmm {
    /// Remove a região `rno` do processo. A região é destruída quando o
    /// último usuário a remove.
    pub fn remove(&mut self, pid: Pid, rno: usize) -> MmResult<()> {
        let space = self.spaces.get_mut(&pid).ok_or(MmError::NoSuchProcess)?;
        let vm = space.take(rno).ok_or(MmError::RegionNotFound)?;

        let Some(region) = self.regions.get_mut(&vm.region) else {
            return Err(MmError::RegionNotFound);
        };
        space.page_dir.unmap_range(vm.virt, region.page_count());

        if region.remove_user(pid) == 0 {
            if let Some(region) = self.regions.remove(&vm.region) {
                self.destroy_region(region);
            }
        }
        crate::ktrace!("(VMM) Região removida, rno=", rno);
        Ok(())
    }

    /// Remove todas as regiões e o espaço de endereçamento do processo
    pub fn remove_all(&mut self, pid: Pid) -> MmResult<()> {
        let rnos: Vec<usize> = self
            .spaces
            .get(&pid)
            .ok_or(MmError::NoSuchProcess)?
            .iter()
            .map(|(rno, _)| rno)
            .collect();
        for rno in rnos {
            self.remove(pid, rno)?;
        }
        self.spaces.remove(&pid);
        crate::kdebug!("(VMM) Espaço removido, pid=", pid.as_u32());
        Ok(())
    }
}
