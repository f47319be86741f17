//! # Page Reclaim Subsystem
//!
//! Escolha de páginas para o swap.
//!
//! A vítima é uma página aleatória da região menos recentemente usada
//! (menor timestamp). Só entram páginas presentes de regiões sem frames
//! fixos; páginas COW só quando o frame já não é compartilhado. O sorteio
//! usa o gerador do VMM, semeado por
//! [`VmmConfig::rng_seed`](crate::mm::config::VmmConfig).

use crate::mm::io::IoWait;
use crate::mm::region::{Region, RegionId};
use crate::mm::vmm::Vmm;
use crate::sys::types::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    None,
    Low,
    Medium,
    Critical,
}

/// Menor timestamp; empate decidido pelo menor id
fn older<'a>(best: Option<&'a Region>, candidate: &'a Region) -> Option<&'a Region> {
    match best {
        Some(b) if (b.timestamp(), b.id()) <= (candidate.timestamp(), candidate.id()) => Some(b),
        _ => Some(candidate),
    }
}

impl Vmm {
    /// Classifica os frames livres contra as marcas d'água
    pub fn pressure(&self) -> MemoryPressure {
        let free = self.frames.free_frames();
        let wm = self.config.watermarks;

        if free > wm.high {
            MemoryPressure::None
        } else if free > wm.low {
            MemoryPressure::Low
        } else if free > wm.min {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Critical
        }
    }

    /// Região do processo usada há mais tempo que ainda tem páginas
    /// expulsáveis
    pub fn lru_region(&self, pid: Pid) -> Option<RegionId> {
        let space = self.spaces.get(&pid)?;
        space
            .iter()
            .filter_map(|(_, vm)| self.regions.get(&vm.region))
            .filter(|r| r.has_swappable_pages(&self.cow))
            .fold(None, older)
            .map(|r| r.id())
    }

    /// Como [`lru_region`](Self::lru_region), entre todas as regiões
    pub fn lru_region_global(&self) -> Option<RegionId> {
        self.regions
            .values()
            .filter(|r| r.has_swappable_pages(&self.cow))
            .fold(None, older)
            .map(|r| r.id())
    }

    /// Sorteia uma página expulsável da região
    pub fn page_index_for_swap(&mut self, id: RegionId) -> Option<usize> {
        let region = self.regions.get(&id)?;
        let eligible = region.swappable_pages(&self.cow).count();
        if eligible == 0 {
            return None;
        }
        let pick = self.rng.below(eligible);
        region.swappable_pages(&self.cow).nth(pick)
    }

    /// (região, página) a expulsar
    pub fn select_swap_victim(&mut self) -> Option<(RegionId, usize)> {
        let id = self.lru_region_global()?;
        let index = self.page_index_for_swap(id)?;
        Some((id, index))
    }

    /// Expulsa até `target` páginas. Devolve quantas saíram.
    pub fn evict_pages(&mut self, target: usize, io: &dyn IoWait) -> usize {
        let mut evicted = 0;
        while evicted < target {
            let Some((id, index)) = self.select_swap_victim() else {
                break;
            };
            if let Err(e) = self.swap_out(id, index, io) {
                crate::kdebug!("(Reclaim) Swap-out falhou:");
                crate::kdebug!(e.as_str());
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            crate::ktrace!("(Reclaim) Páginas expulsas: ", evicted);
        }
        evicted
    }

    /// Trabalho do swapper: expulsa até os frames livres passarem da marca
    /// alta. Não faz nada acima da marca baixa.
    pub fn balance(&mut self, io: &dyn IoWait) -> usize {
        if self.pressure() <= MemoryPressure::Low {
            return 0;
        }
        let free = self.frames.free_frames();
        let want = self.config.watermarks.high.saturating_sub(free) + 1;
        self.evict_pages(want, io)
    }
}
