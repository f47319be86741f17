//! Tabela de threads (arena com handles estáveis)
//!
//! Os elos das filas guardam índices de slot. Handles públicos carregam a
//! geração do slot, então um handle de thread destruída nunca alcança a
//! thread que reutilizou o slot.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::entity::Thread;
use crate::sys::types::Tid;

/// Índice de slot na arena
pub type SlotIdx = u32;

/// Referência estável para uma thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle {
    index: SlotIdx,
    generation: u32,
}

impl ThreadHandle {
    #[inline]
    pub const fn index(self) -> SlotIdx {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    thread: Option<Thread>,
}

/// Arena de threads
pub struct ThreadTable {
    slots: Vec<Slot>,
    free: Vec<SlotIdx>,
    by_tid: BTreeMap<Tid, SlotIdx>,
}

impl ThreadTable {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_tid: BTreeMap::new(),
        }
    }

    pub fn with_capacity(slots: usize) -> Self {
        Self {
            slots: Vec::with_capacity(slots),
            free: Vec::new(),
            by_tid: BTreeMap::new(),
        }
    }

    /// Threads vivas
    pub fn len(&self) -> usize {
        self.by_tid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tid.is_empty()
    }

    /// Insere uma thread e devolve seu handle
    pub fn insert(&mut self, thread: Thread) -> ThreadHandle {
        let tid = thread.tid;
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].thread = Some(thread);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    thread: Some(thread),
                });
                (self.slots.len() - 1) as SlotIdx
            }
        };
        self.by_tid.insert(tid, index);
        self.handle_of(index)
    }

    /// Remove a thread; o slot ganha nova geração
    pub fn remove(&mut self, handle: ThreadHandle) -> Option<Thread> {
        if !self.contains(handle) {
            return None;
        }
        let slot = &mut self.slots[handle.index as usize];
        let thread = slot.thread.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.by_tid.remove(&thread.tid);
        self.free.push(handle.index);
        Some(thread)
    }

    /// Handle é de uma thread viva?
    pub fn contains(&self, handle: ThreadHandle) -> bool {
        self.slots
            .get(handle.index as usize)
            .map_or(false, |s| s.generation == handle.generation && s.thread.is_some())
    }

    pub fn get(&self, handle: ThreadHandle) -> Option<&Thread> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.thread.as_ref()
    }

    pub fn get_mut(&mut self, handle: ThreadHandle) -> Option<&mut Thread> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.thread.as_mut()
    }

    /// Acesso por índice (usado pelas filas)
    #[inline]
    pub(crate) fn at(&self, index: SlotIdx) -> Option<&Thread> {
        self.slots.get(index as usize)?.thread.as_ref()
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, index: SlotIdx) -> Option<&mut Thread> {
        self.slots.get_mut(index as usize)?.thread.as_mut()
    }

    #[inline]
    pub(crate) fn handle_of(&self, index: SlotIdx) -> ThreadHandle {
        let generation = self.slots.get(index as usize).map_or(0, |s| s.generation);
        ThreadHandle { index, generation }
    }

    pub fn by_tid(&self, tid: Tid) -> Option<ThreadHandle> {
        self.by_tid.get(&tid).map(|&index| self.handle_of(index))
    }

    /// Itera threads vivas em ordem de TID
    pub fn iter(&self) -> impl Iterator<Item = (ThreadHandle, &Thread)> + '_ {
        self.by_tid.values().filter_map(move |&index| {
            self.at(index).map(|t| (self.handle_of(index), t))
        })
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}
