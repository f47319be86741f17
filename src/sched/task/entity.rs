//! Thread Control Block

use core::sync::atomic::{AtomicU32, Ordering};

use super::accounting::Accounting;
use super::context::CpuContext;
use super::events::{Events, WaitObj};
use super::state::{QueueKind, ThreadState};
use super::table::SlotIdx;
use crate::mm::VirtAddr;
use crate::sched::config::MAX_THREAD_NAME;
use crate::sys::types::{Pid, Tid};

/// Contador global de TIDs
static NEXT_TID: AtomicU32 = AtomicU32::new(1);

/// Elo intrusivo da thread na fila que a contém
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueLink {
    pub(crate) prev: Option<SlotIdx>,
    pub(crate) next: Option<SlotIdx>,
    pub(crate) queue: Option<QueueKind>,
    /// Retirada das filas por `remove_thread`, aguardando kill/destroy
    pub(crate) detached: bool,
}

/// Thread Control Block
pub struct Thread {
    /// ID único
    pub tid: Tid,
    /// Processo dono (referência fraca)
    pub pid: Pid,
    /// Stack do kernel
    pub kernel_stack: VirtAddr,
    /// Contexto de CPU salvo
    pub context: CpuContext,
    /// Estatísticas de contabilidade
    pub accounting: Accounting,

    // Mutados apenas pelo scheduler
    pub(crate) state: ThreadState,
    pub(crate) events: Events,
    pub(crate) event_obj: Option<WaitObj>,
    pub(crate) link: QueueLink,

    /// Nome (debug)
    name: [u8; MAX_THREAD_NAME],
}

impl Thread {
    pub(crate) fn new(pid: Pid, name: &str, state: ThreadState) -> Self {
        let tid = Tid::new(NEXT_TID.fetch_add(1, Ordering::Relaxed));

        let mut name_buf = [0u8; MAX_THREAD_NAME];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_THREAD_NAME - 1);
        name_buf[..len].copy_from_slice(&bytes[..len]);

        Self {
            tid,
            pid,
            kernel_stack: VirtAddr::new(0),
            context: CpuContext::new(),
            accounting: Accounting::new(),
            state,
            events: Events::empty(),
            event_obj: None,
            link: QueueLink::default(),
            name: name_buf,
        }
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Eventos aguardados
    #[inline]
    pub fn events(&self) -> Events {
        self.events
    }

    /// Canal de espera (`None` = qualquer canal)
    #[inline]
    pub fn event_obj(&self) -> Option<WaitObj> {
        self.event_obj
    }

    /// Fila que contém a thread
    #[inline]
    pub fn queue(&self) -> Option<QueueKind> {
        self.link.queue
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    /// Verifica se a thread aguarda algum evento de `mask` em `obj`
    #[inline]
    pub(crate) fn waits_for(&self, obj: WaitObj, mask: Events) -> bool {
        self.events.intersects(mask) && self.event_obj.map_or(true, |o| o == obj)
    }

    #[inline]
    pub(crate) fn clear_wait(&mut self) {
        self.events = Events::empty();
        self.event_obj = None;
    }
}
