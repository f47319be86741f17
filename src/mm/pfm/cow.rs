//! Refcount de frames copy-on-write
//!
//! Conta quantas páginas (de regiões privadas distintas) apontam para o
//! mesmo frame após um fork. Frames com um único dono não ficam na tabela.

use alloc::collections::BTreeMap;

use crate::mm::addr::FrameNo;

#[derive(Debug, Default)]
pub struct CowTracker {
    refs: BTreeMap<FrameNo, u32>,
}

impl CowTracker {
    pub const fn new() -> Self {
        Self {
            refs: BTreeMap::new(),
        }
    }

    /// Mais uma página passa a compartilhar `frame`. Devolve o novo total.
    pub fn share(&mut self, frame: FrameNo) -> u32 {
        let count = self.refs.entry(frame).or_insert(1);
        *count += 1;
        *count
    }

    /// Páginas que compartilham `frame` (0 = dono exclusivo)
    pub fn sharers(&self, frame: FrameNo) -> u32 {
        self.refs.get(&frame).copied().unwrap_or(0)
    }

    /// Uma página deixa de usar `frame`. Devolve quantas continuam usando;
    /// 0 significa que quem liberou era o dono exclusivo e o frame pode ir
    /// para o alocador.
    pub fn release(&mut self, frame: FrameNo) -> u32 {
        match self.refs.get_mut(&frame) {
            Some(count) => {
                *count -= 1;
                let remaining = *count;
                if remaining <= 1 {
                    self.refs.remove(&frame);
                }
                remaining
            }
            None => 0,
        }
    }

    pub fn tracked(&self) -> usize {
        self.refs.len()
    }
}
