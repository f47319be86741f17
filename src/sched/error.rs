//! Violações de contrato do Scheduler
//!
//! Transições ilegais, handles inválidos e filas corrompidas indicam bug no
//! núcleo. Não são recuperáveis: [`fatal`] registra o diagnóstico e aborta.

use core::fmt;

use super::task::table::SlotIdx;
use super::task::{QueueKind, ThreadHandle, ThreadState};
use crate::sys::types::Tid;

/// Operação que disparou a violação
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SetRunning,
    SetReady,
    SetReadyQuick,
    SetBlocked,
    Suspend,
    Resume,
    Remove,
    Kill,
    Destroy,
    Dispatch,
    Wait,
}

impl Transition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetRunning => "set_running",
            Self::SetReady => "set_ready",
            Self::SetReadyQuick => "set_ready_quick",
            Self::SetBlocked => "set_blocked",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Remove => "remove_thread",
            Self::Kill => "kill",
            Self::Destroy => "destroy",
            Self::Dispatch => "pick_next",
            Self::Wait => "wait",
        }
    }
}

/// Falha fatal de consistência interna
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedFault {
    /// Transição não permitida a partir do estado atual
    InvalidTransition {
        op: Transition,
        tid: Tid,
        state: ThreadState,
    },
    /// Handle de thread destruída (ou nunca criada)
    StaleHandle { op: Transition, handle: ThreadHandle },
    /// Elo de fila não corresponde ao estado/fila esperados
    QueueCorrupted {
        tid: Tid,
        expected: Option<QueueKind>,
        found: Option<QueueKind>,
    },
    /// Elo aponta para slot vazio
    DanglingLink { index: SlotIdx },
    /// Fila de prontos vazia sem thread idle/fallback designada
    NoDispatchTarget { outgoing_zombie: bool },
}

impl fmt::Display for SchedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { op, tid, state } => write!(
                f,
                "transição inválida: {} em tid {} ({})",
                op.as_str(),
                tid.as_u32(),
                state.as_str()
            ),
            Self::StaleHandle { op, handle } => write!(
                f,
                "handle inválido em {}: slot {} geração {}",
                op.as_str(),
                handle.index(),
                handle.generation()
            ),
            Self::QueueCorrupted {
                tid,
                expected,
                found,
            } => write!(
                f,
                "fila corrompida: tid {} esperado {:?} encontrado {:?}",
                tid.as_u32(),
                expected,
                found
            ),
            Self::DanglingLink { index } => write!(f, "elo de fila para slot vazio {}", index),
            Self::NoDispatchTarget { outgoing_zombie } => write!(
                f,
                "sem thread para despachar (saindo zumbi: {})",
                outgoing_zombie
            ),
        }
    }
}

/// Aborta o núcleo com o diagnóstico da violação.
#[cold]
#[inline(never)]
pub fn fatal(fault: SchedFault) -> ! {
    crate::kerror!("(Sched) FATAL: violação de contrato do scheduler");
    match fault {
        SchedFault::InvalidTransition { tid, state, .. } => {
            crate::kerror!("(Sched) tid=", tid.as_u32());
            crate::kerror!(state.as_str());
        }
        SchedFault::QueueCorrupted { tid, .. } => {
            crate::kerror!("(Sched) tid=", tid.as_u32());
        }
        SchedFault::StaleHandle { handle, .. } => {
            crate::kerror!("(Sched) slot=", handle.index());
        }
        SchedFault::DanglingLink { index } => {
            crate::kerror!("(Sched) slot=", index);
        }
        SchedFault::NoDispatchTarget { .. } => {}
    }
    panic!("(Sched) {}", fault);
}
