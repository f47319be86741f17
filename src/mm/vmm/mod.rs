//! Virtual Memory Manager (VMM)
//!
//! Gerencia regiões, espaços de endereçamento e tabelas de páginas.
//!
//! O [`Vmm`] é dono de todas as regiões (`RegionId → Region`) e de todos os
//! espaços de endereçamento (`Pid → AddressSpace`). Uma instância fica atrás
//! do lock de paginação do [`Kernel`](crate::core::kernel::Kernel); nenhuma
//! operação aqui toma o lock do scheduler.
//!
//! # Organização
//!
//! | Arquivo     | Operações                                      |
//! |-------------|------------------------------------------------|
//! | `add.rs`    | `add`, `add_phys`, `set_reg_prot`, posicionamento |
//! | `share.rs`  | `join`, `clone_all`                            |
//! | `remove.rs` | `remove`, `remove_all`                         |
//! | `grow.rs`   | `grow`, `grow_stack_to`                        |
//! | `pager.rs`  | `swap_out`, `swap_in`                          |
//!
//! O resolvedor de page faults está em [`crate::mm::fault`] e a seleção de
//! vítimas de swap em [`crate::mm::reclaim`].

mod add;
mod grow;
pub mod mapper;
mod pager;
mod remove;
mod share;

pub use mapper::{MapFlags, PageDir, Pte};

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::klib::random::XorShift64;
use crate::mm::addr::{FrameNo, VirtAddr};
use crate::mm::aspace::{AddressSpace, VmRegion};
use crate::mm::config::{VmmConfig, PAGE_SIZE};
use crate::mm::error::{MmError, MmResult};
use crate::mm::io::BinaryStore;
use crate::mm::pfm::{CowTracker, PhysMemory};
use crate::mm::region::{PageEntry, PageState, Region, RegionFlags, RegionId};
use crate::mm::swap::SwapSpace;
use crate::sys::types::{FileId, Pid};

/// Contadores do VMM
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VmmStats {
    pub faults: u64,
    pub demand_loads: u64,
    pub zero_fills: u64,
    pub cow_copies: u64,
    pub cow_reuses: u64,
    pub swap_outs: u64,
    pub swap_ins: u64,
    pub segfaults: u64,
    pub direct_reclaims: u64,
}

/// Uso de memória de um processo
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemUsage {
    /// Páginas virtuais de todas as regiões
    pub virtual_pages: usize,
    /// Páginas com frame
    pub resident_pages: usize,
    /// Páginas no swap
    pub swapped_pages: usize,
    /// Frames proporcionais em milésimos de página: cada frame conta
    /// 1000 dividido pelo número de processos que o usam
    pub proportional_milli: usize,
}

/// Gerenciador de memória virtual
pub struct Vmm {
    pub(crate) config: VmmConfig,
    pub(crate) frames: Box<dyn PhysMemory + Send>,
    pub(crate) binaries: Box<dyn BinaryStore + Send>,
    pub(crate) swap: SwapSpace,
    pub(crate) cow: CowTracker,
    pub(crate) regions: BTreeMap<RegionId, Region>,
    pub(crate) spaces: BTreeMap<Pid, AddressSpace>,
    pub(crate) next_region: u64,
    pub(crate) clock: u64,
    pub(crate) rng: XorShift64,
    pub(crate) stats: VmmStats,
}

impl Vmm {
    pub fn new<P, B>(frames: P, binaries: B, swap: SwapSpace, config: VmmConfig) -> Self
    where
        P: PhysMemory + Send + 'static,
        B: BinaryStore + Send + 'static,
    {
        crate::kinfo!("(VMM) Inicializado, frames=", frames.total_frames());
        Self {
            config,
            frames: Box::new(frames),
            binaries: Box::new(binaries),
            swap,
            cow: CowTracker::new(),
            regions: BTreeMap::new(),
            spaces: BTreeMap::new(),
            next_region: 1,
            clock: 0,
            rng: XorShift64::new(config.rng_seed),
            stats: VmmStats::default(),
        }
    }

    // =========================================================================
    // PROCESSOS
    // =========================================================================

    /// Cria o espaço de endereçamento (vazio) de um processo
    pub fn create_process(&mut self, pid: Pid) -> MmResult<()> {
        if self.spaces.contains_key(&pid) {
            return Err(MmError::ProcessExists);
        }
        self.spaces.insert(pid, AddressSpace::new(pid));
        crate::kdebug!("(VMM) Espaço criado para pid=", pid.as_u32());
        Ok(())
    }

    pub fn has_process(&self, pid: Pid) -> bool {
        self.spaces.contains_key(&pid)
    }

    pub fn address_space(&self, pid: Pid) -> Option<&AddressSpace> {
        self.spaces.get(&pid)
    }

    // =========================================================================
    // CONSULTAS
    // =========================================================================

    /// O processo usa o número de região `rno`?
    pub fn exists(&self, pid: Pid, rno: usize) -> bool {
        self.vm_region(pid, rno).is_some()
    }

    pub fn vm_region(&self, pid: Pid, rno: usize) -> Option<VmRegion> {
        self.spaces.get(&pid)?.get(rno).copied()
    }

    /// Região usada pelo processo sob o número `rno`
    pub fn region(&self, pid: Pid, rno: usize) -> Option<&Region> {
        let vm = self.vm_region(pid, rno)?;
        self.regions.get(&vm.region)
    }

    pub fn region_by_id(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    /// Número da região que contém `addr`
    pub fn region_of(&self, pid: Pid, addr: VirtAddr) -> Option<usize> {
        self.locate(pid, addr).map(|(rno, _, _)| rno)
    }

    /// Número com que o processo usa a região `id`
    pub fn rno_by_region(&self, pid: Pid, id: RegionId) -> Option<usize> {
        self.spaces.get(&pid)?.rno_of(id)
    }

    /// Intervalo `[início, fim)` da região no processo
    pub fn reg_range(&self, pid: Pid, rno: usize) -> Option<(VirtAddr, VirtAddr)> {
        let vm = self.vm_region(pid, rno)?;
        let region = self.regions.get(&vm.region)?;
        Some((vm.virt, vm.virt.add_pages(region.page_count())))
    }

    /// Número de uma região do processo carregada de `file`
    pub fn has_binary(&self, pid: Pid, file: FileId) -> Option<usize> {
        let space = self.spaces.get(&pid)?;
        space
            .iter()
            .find(|(_, vm)| {
                self.regions
                    .get(&vm.region)
                    .and_then(|r| r.binary())
                    .is_some_and(|b| b.file == file)
            })
            .map(|(rno, _)| rno)
    }

    /// Processos que usam a região `rno` do processo
    pub fn users_of(&self, pid: Pid, rno: usize) -> Vec<Pid> {
        self.region(pid, rno)
            .map(|r| r.users().to_vec())
            .unwrap_or_default()
    }

    /// Estado da página que contém `addr` (debug)
    pub fn page_of(&self, pid: Pid, addr: VirtAddr) -> Option<PageEntry> {
        let (_, vm, index) = self.locate(pid, addr)?;
        self.regions.get(&vm.region)?.page(index).copied()
    }

    /// Entrada da tabela de páginas para `addr`
    pub fn translate(&self, pid: Pid, addr: VirtAddr) -> Option<Pte> {
        self.spaces.get(&pid)?.page_dir.translate(addr)
    }

    pub fn mem_usage(&self, pid: Pid) -> MmResult<MemUsage> {
        let space = self.spaces.get(&pid).ok_or(MmError::NoSuchProcess)?;
        let mut usage = MemUsage::default();
        for (_, vm) in space.iter() {
            let Some(region) = self.regions.get(&vm.region) else {
                continue;
            };
            let users = region.users().len().max(1);
            usage.virtual_pages += region.page_count();
            usage.swapped_pages += region.swapped_pages();
            for entry in &region.pages {
                let Some(frame) = entry.frame() else {
                    continue;
                };
                usage.resident_pages += 1;
                let sharers = if entry.is_cow() {
                    self.cow.sharers(frame).max(1) as usize
                } else {
                    1
                };
                usage.proportional_milli += 1000 / (users * sharers);
            }
        }
        Ok(usage)
    }

    /// Marca todas as regiões do processo como acessadas agora
    pub fn set_timestamp(&mut self, pid: Pid) -> u64 {
        let now = self.tick();
        if let Some(space) = self.spaces.get(&pid) {
            for (_, vm) in space.iter() {
                if let Some(region) = self.regions.get_mut(&vm.region) {
                    region.timestamp = now;
                }
            }
        }
        now
    }

    /// Imprime as regiões do processo via log
    pub fn dump_regions(&self, pid: Pid) {
        let Some(space) = self.spaces.get(&pid) else {
            crate::kwarn!("(VMM) dump_regions: pid sem espaço ", pid.as_u32());
            return;
        };
        crate::kdebug!("(VMM) Regiões do pid=", pid.as_u32());
        for (rno, vm) in space.iter() {
            let Some(region) = self.regions.get(&vm.region) else {
                continue;
            };
            crate::kdebug!("  rno=", rno);
            crate::kdebug!(region.kind().as_str());
            crate::kdebug!("    virt=", vm.virt.as_u64());
            crate::kdebug!("    pages=", region.page_count());
            crate::kdebug!("    resident=", region.resident_pages());
            crate::kdebug!("    users=", region.users().len());
        }
    }

    pub fn stats(&self) -> VmmStats {
        self.stats
    }

    pub fn config(&self) -> &VmmConfig {
        &self.config
    }

    pub fn frames(&self) -> &dyn PhysMemory {
        &*self.frames
    }

    pub fn swap(&self) -> &SwapSpace {
        &self.swap
    }

    pub fn cow(&self) -> &CowTracker {
        &self.cow
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    // =========================================================================
    // HELPERS INTERNOS
    // =========================================================================

    /// Avança o relógio lógico usado como timestamp de LRU
    pub(crate) fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub(crate) fn alloc_region_id(&mut self) -> RegionId {
        let id = RegionId(self.next_region);
        self.next_region += 1;
        id
    }

    /// (rno, uso, índice da página) para o endereço
    pub(crate) fn locate(&self, pid: Pid, addr: VirtAddr) -> Option<(usize, VmRegion, usize)> {
        let space = self.spaces.get(&pid)?;
        space.iter().find_map(|(rno, vm)| {
            let region = self.regions.get(&vm.region)?;
            let start = vm.virt.as_u64();
            let end = start + region.byte_len() as u64;
            let a = addr.as_u64();
            (a >= start && a < end).then(|| (rno, *vm, ((a - start) / PAGE_SIZE as u64) as usize))
        })
    }

    /// Intervalo `[início, fim)` ocupado pela região no processo
    pub(crate) fn span(&self, vm: &VmRegion) -> (u64, u64) {
        let pages = self
            .regions
            .get(&vm.region)
            .map_or(0, |r| r.page_count());
        let start = vm.virt.as_u64();
        (start, start + (pages * PAGE_SIZE) as u64)
    }

    /// `[start, end)` não colide com nenhuma região do processo (exceto `skip`)
    pub(crate) fn range_is_free(&self, pid: Pid, start: u64, end: u64, skip: Option<usize>) -> bool {
        let Some(space) = self.spaces.get(&pid) else {
            return false;
        };
        space
            .iter()
            .filter(|(rno, _)| Some(*rno) != skip)
            .all(|(_, vm)| {
                let (s, e) = self.span(vm);
                e <= start || s >= end
            })
    }

    /// Mapeia a página `index` da região em todos os seus usuários
    pub(crate) fn map_for_users(&mut self, id: RegionId, index: usize) {
        let Some(region) = self.regions.get(&id) else {
            return;
        };
        let Some(entry) = region.page(index) else {
            return;
        };
        let Some(frame) = entry.frame() else {
            return;
        };
        let flags = region.map_flags(entry);
        for pid in region.users() {
            if let Some(space) = self.spaces.get_mut(pid) {
                if let Some(rno) = space.rno_of(id) {
                    if let Some(vm) = space.get(rno).copied() {
                        space.page_dir.map(vm.virt.add_pages(index), frame, flags);
                    }
                }
            }
        }
    }

    /// Mapeia a página apenas para `pid`
    pub(crate) fn map_for(&mut self, pid: Pid, id: RegionId, index: usize) {
        let Some(region) = self.regions.get(&id) else {
            return;
        };
        let Some(entry) = region.page(index) else {
            return;
        };
        let Some(frame) = entry.frame() else {
            return;
        };
        let flags = region.map_flags(entry);
        if let Some(space) = self.spaces.get_mut(&pid) {
            if let Some(vm) = space.rno_of(id).and_then(|rno| space.get(rno).copied()) {
                space.page_dir.map(vm.virt.add_pages(index), frame, flags);
            }
        }
    }

    /// Remove o mapeamento da página em todos os usuários
    pub(crate) fn unmap_for_users(&mut self, id: RegionId, index: usize) {
        let Some(region) = self.regions.get(&id) else {
            return;
        };
        for pid in region.users() {
            if let Some(space) = self.spaces.get_mut(pid) {
                if let Some(vm) = space.rno_of(id).and_then(|rno| space.get(rno).copied()) {
                    space.page_dir.unmap(vm.virt.add_pages(index));
                }
            }
        }
    }

    /// Mapeia no processo todas as páginas residentes da região `rno`
    pub(crate) fn map_region_into(&mut self, pid: Pid, rno: usize) {
        let Some(vm) = self.vm_region(pid, rno) else {
            return;
        };
        let Some(region) = self.regions.get(&vm.region) else {
            return;
        };
        let Some(space) = self.spaces.get_mut(&pid) else {
            return;
        };
        for (index, entry) in region.pages.iter().enumerate() {
            if let Some(frame) = entry.frame() {
                space
                    .page_dir
                    .map(vm.virt.add_pages(index), frame, region.map_flags(entry));
            }
        }
    }

    /// Devolve os recursos de uma página que deixou de existir
    pub(crate) fn release_page(&mut self, flags: RegionFlags, entry: PageEntry) {
        match entry.state {
            PageState::Absent => {}
            PageState::Present(frame) => {
                if flags.contains(RegionFlags::NOFREE) {
                    return;
                }
                if entry.is_cow() && self.cow.release(frame) > 0 {
                    // Outro processo ainda usa o frame
                    return;
                }
                self.frames.free_frame(frame);
            }
            PageState::Swapped(slot) => self.swap.free_slot(slot),
        }
    }

    /// Destrói uma região sem usuários
    pub(crate) fn destroy_region(&mut self, region: Region) {
        crate::ktrace!("(VMM) Destruindo região id=", region.id().0);
        for entry in &region.pages {
            self.release_page(region.flags, *entry);
        }
    }
}
