//! # Address Space Manager
//!
//! Espaço de endereçamento de um processo: a tabela `número de região →
//! VmRegion` e a tabela de páginas. As regiões em si vivem no
//! [`Vmm`](crate::mm::vmm::Vmm), que pode ligá-las a vários processos.

use alloc::vec::Vec;

use crate::mm::addr::VirtAddr;
use crate::mm::config::{MAX_REGUSE_COUNT, RNO_FIRST_DYNAMIC};
use crate::mm::region::RegionId;
use crate::mm::vmm::mapper::PageDir;
use crate::sys::types::Pid;

/// Uso de uma região por um processo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmRegion {
    pub region: RegionId,
    /// Endereço da primeira página da região neste processo
    pub virt: VirtAddr,
}

/// Espaço de endereçamento
#[derive(Debug)]
pub struct AddressSpace {
    pid: Pid,
    regions: Vec<Option<VmRegion>>,
    pub(crate) page_dir: PageDir,
}

impl AddressSpace {
    pub fn new(pid: Pid) -> Self {
        let mut regions = Vec::new();
        regions.resize(RNO_FIRST_DYNAMIC, None);
        Self {
            pid,
            regions,
            page_dir: PageDir::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn page_dir(&self) -> &PageDir {
        &self.page_dir
    }

    pub fn get(&self, rno: usize) -> Option<&VmRegion> {
        self.regions.get(rno).and_then(|r| r.as_ref())
    }

    pub(crate) fn get_mut(&mut self, rno: usize) -> Option<&mut VmRegion> {
        self.regions.get_mut(rno).and_then(|r| r.as_mut())
    }

    pub fn contains(&self, rno: usize) -> bool {
        self.get(rno).is_some()
    }

    pub(crate) fn set(&mut self, rno: usize, vm: VmRegion) {
        if rno >= self.regions.len() {
            self.regions.resize(rno + 1, None);
        }
        self.regions[rno] = Some(vm);
    }

    pub(crate) fn take(&mut self, rno: usize) -> Option<VmRegion> {
        let vm = self.regions.get_mut(rno)?.take();
        while self.regions.len() > RNO_FIRST_DYNAMIC && self.regions.last() == Some(&None) {
            self.regions.pop();
        }
        vm
    }

    /// Primeiro número dinâmico livre
    pub fn free_rno(&self) -> Option<usize> {
        let free = (RNO_FIRST_DYNAMIC..self.regions.len())
            .find(|&rno| self.regions[rno].is_none())
            .unwrap_or(self.regions.len());
        (free < MAX_REGUSE_COUNT).then_some(free)
    }

    /// Número com que este processo usa `region`
    pub fn rno_of(&self, region: RegionId) -> Option<usize> {
        self.iter().find(|(_, vm)| vm.region == region).map(|(rno, _)| rno)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &VmRegion)> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(rno, vm)| vm.as_ref().map(|vm| (rno, vm)))
    }

    pub fn region_count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
