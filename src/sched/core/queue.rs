//! Filas intrusivas de threads
//!
//! Lista duplamente encadeada cujos elos vivem no próprio TCB
//! ([`QueueLink`](crate::sched::task::entity::QueueLink)). Nenhuma operação
//! aloca memória e todas são O(1), exceto [`ThreadQueue::verify`].

use crate::sched::error::{fatal, SchedFault};
use crate::sched::task::table::{SlotIdx, ThreadTable};
use crate::sched::task::{QueueKind, Thread};

/// Fila FIFO de threads
#[derive(Debug)]
pub struct ThreadQueue {
    kind: QueueKind,
    head: Option<SlotIdx>,
    tail: Option<SlotIdx>,
    len: usize,
}

#[inline]
fn node(table: &ThreadTable, index: SlotIdx) -> &Thread {
    match table.at(index) {
        Some(t) => t,
        None => fatal(SchedFault::DanglingLink { index }),
    }
}

#[inline]
fn node_mut(table: &mut ThreadTable, index: SlotIdx) -> &mut Thread {
    match table.at_mut(index) {
        Some(t) => t,
        None => fatal(SchedFault::DanglingLink { index }),
    }
}

impl ThreadQueue {
    pub const fn new(kind: QueueKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn head(&self) -> Option<SlotIdx> {
        self.head
    }

    /// Sucessor de `index` nesta fila
    #[inline]
    pub fn next_of(&self, table: &ThreadTable, index: SlotIdx) -> Option<SlotIdx> {
        node(table, index).link.next
    }

    fn claim(&self, thread: &Thread) {
        if thread.link.queue.is_some() {
            fatal(SchedFault::QueueCorrupted {
                tid: thread.tid,
                expected: None,
                found: thread.link.queue,
            });
        }
    }

    /// Insere no fim
    pub fn append(&mut self, table: &mut ThreadTable, index: SlotIdx) {
        let tail = self.tail;
        {
            let t = node_mut(table, index);
            self.claim(t);
            t.link.prev = tail;
            t.link.next = None;
            t.link.queue = Some(self.kind);
        }
        match tail {
            Some(old) => node_mut(table, old).link.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Insere no início
    pub fn prepend(&mut self, table: &mut ThreadTable, index: SlotIdx) {
        let head = self.head;
        {
            let t = node_mut(table, index);
            self.claim(t);
            t.link.prev = None;
            t.link.next = head;
            t.link.queue = Some(self.kind);
        }
        match head {
            Some(old) => node_mut(table, old).link.prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        self.len += 1;
    }

    /// Remove e devolve o primeiro elemento
    pub fn dequeue(&mut self, table: &mut ThreadTable) -> Option<SlotIdx> {
        let head = self.head?;
        self.remove(table, head);
        Some(head)
    }

    /// Remove um elemento qualquer (que deve estar nesta fila)
    pub fn remove(&mut self, table: &mut ThreadTable, index: SlotIdx) {
        let (prev, next) = {
            let t = node_mut(table, index);
            if t.link.queue != Some(self.kind) {
                fatal(SchedFault::QueueCorrupted {
                    tid: t.tid,
                    expected: Some(self.kind),
                    found: t.link.queue,
                });
            }
            let links = (t.link.prev, t.link.next);
            t.link.prev = None;
            t.link.next = None;
            t.link.queue = None;
            links
        };
        match prev {
            Some(p) => node_mut(table, p).link.next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => node_mut(table, n).link.prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    pub fn iter<'a>(&self, table: &'a ThreadTable) -> QueueIter<'a> {
        QueueIter {
            table,
            cursor: self.head,
        }
    }

    /// Percorre a fila conferindo elos, pertinência e contagem.
    pub fn verify(&self, table: &ThreadTable) -> bool {
        let mut prev = None;
        let mut cursor = self.head;
        let mut count = 0;
        while let Some(index) = cursor {
            let Some(t) = table.at(index) else {
                return false;
            };
            if t.link.queue != Some(self.kind) || t.link.prev != prev {
                return false;
            }
            count += 1;
            if count > self.len {
                return false;
            }
            prev = Some(index);
            cursor = t.link.next;
        }
        count == self.len && self.tail == prev
    }
}

/// Iterador sobre os slots de uma fila, da cabeça para a cauda
pub struct QueueIter<'a> {
    table: &'a ThreadTable,
    cursor: Option<SlotIdx>,
}

impl<'a> Iterator for QueueIter<'a> {
    type Item = &'a Thread;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let t = node(self.table, index);
        self.cursor = t.link.next;
        Some(t)
    }
}
