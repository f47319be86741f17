//! Máquina de estados de threads
//!
//! Toda mudança de estado passa por aqui e mantém a pertinência às filas
//! coerente com o estado (ver [`ThreadState`]). Transições ilegais são
//! violações de contrato e abortam via [`fatal`].

use alloc::vec::Vec;

use super::queue::ThreadQueue;
use crate::sched::config::{INITIAL_THREAD_SLOTS, QUEUE_CHECKS};
use crate::sched::error::{fatal, SchedFault, Transition};
use crate::sched::task::table::SlotIdx;
use crate::sched::task::{
    Events, QueueKind, Thread, ThreadHandle, ThreadState, ThreadTable, WaitObj,
};
use crate::sys::types::{Pid, Tid};

/// Estado do scheduler: arena de threads + filas ready/blocked.
pub struct Scheduler {
    pub(super) threads: ThreadTable,
    pub(super) ready: ThreadQueue,
    pub(super) blocked: ThreadQueue,
    /// Thread na CPU (a que sai no próximo `pick_next`)
    pub(super) current: Option<SlotIdx>,
    /// Thread idle: nunca entra na fila de prontos
    pub(super) idle: Option<SlotIdx>,
    /// Thread escolhida quando a que sai é zumbi e não há prontos
    pub(super) fallback: Option<SlotIdx>,
    /// `current` foi posta na CPU emprestada (idle/fallback): estado, fila e
    /// espera ficam intactos
    pub(super) loaned: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            threads: ThreadTable::with_capacity(INITIAL_THREAD_SLOTS),
            ready: ThreadQueue::new(QueueKind::Ready),
            blocked: ThreadQueue::new(QueueKind::Blocked),
            current: None,
            idle: None,
            fallback: None,
            loaned: false,
        }
    }

    // =========================================================================
    // CRIAÇÃO / DESTRUIÇÃO
    // =========================================================================

    /// Cria uma thread READY no fim da fila de prontos.
    pub fn spawn(&mut self, pid: Pid, name: &str) -> ThreadHandle {
        let handle = self.threads.insert(Thread::new(pid, name, ThreadState::Ready));
        self.ready.append(&mut self.threads, handle.index());
        crate::ktrace!("(Sched) spawn tid=", self.tid_at(handle.index()).as_u32());
        handle
    }

    /// Cria a thread idle.
    ///
    /// Fica estacionada na fila de bloqueados com máscara vazia, então
    /// `unblock_all` nunca a acorda; só o dispatcher a coloca na CPU.
    pub fn spawn_idle(&mut self, pid: Pid) -> ThreadHandle {
        let handle = self
            .threads
            .insert(Thread::new(pid, "idle", ThreadState::Blocked));
        self.blocked.append(&mut self.threads, handle.index());
        self.idle = Some(handle.index());
        crate::kdebug!("(Sched) idle tid=", self.tid_at(handle.index()).as_u32());
        handle
    }

    /// Designa a thread escolhida quando a que sai é zumbi e não há prontos.
    pub fn set_fallback(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::Dispatch);
        self.fallback = Some(index);
    }

    /// Marca a thread como terminada e a retira das filas.
    ///
    /// Threads suspensas viram `ZombieSusp`. Matar a thread idle é fatal.
    pub fn kill(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::Kill);
        let state = self.state_at(index);
        if Some(index) == self.idle {
            self.violation(Transition::Kill, index);
        }
        if state.is_zombie() {
            return;
        }
        self.detach(index);
        let t = self.slot_mut(index);
        t.clear_wait();
        t.link.detached = false;
        t.state = if state.is_suspended() {
            ThreadState::ZombieSusp
        } else {
            ThreadState::Zombie
        };
        crate::ktrace!("(Sched) kill tid=", t.tid.as_u32());
        self.check();
    }

    /// Libera o slot da thread e devolve o TCB ao chamador.
    ///
    /// A thread na CPU não pode ser destruída; ela precisa sair antes via
    /// `pick_next`.
    pub fn destroy(&mut self, handle: ThreadHandle) -> Thread {
        let index = self.resolve(handle, Transition::Destroy);
        if Some(index) == self.current {
            self.violation(Transition::Destroy, index);
        }
        self.detach(index);
        if self.fallback == Some(index) {
            self.fallback = None;
        }
        if self.idle == Some(index) {
            self.idle = None;
        }
        match self.threads.remove(handle) {
            Some(thread) => {
                crate::ktrace!("(Sched) destroy tid=", thread.tid.as_u32());
                self.check();
                thread
            }
            None => fatal(SchedFault::StaleHandle {
                op: Transition::Destroy,
                handle,
            }),
        }
    }

    // =========================================================================
    // TRANSIÇÕES
    // =========================================================================

    /// READY | BLOCKED → RUNNING (RUNNING é no-op).
    pub fn set_running(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::SetRunning);
        self.make_running(index, Transition::SetRunning);
        self.check();
    }

    /// Coloca no fim da fila de prontos.
    pub fn set_ready(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::SetReady);
        self.make_ready(index, false, Transition::SetReady);
        self.check();
    }

    /// Coloca no início da fila de prontos (sinais, timeouts).
    pub fn set_ready_quick(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::SetReadyQuick);
        self.make_ready(index, true, Transition::SetReadyQuick);
        self.check();
    }

    /// RUNNING | READY → BLOCKED; READY_SUSP → BLOCKED_SUSP.
    pub fn set_blocked(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::SetBlocked);
        self.make_blocked(index, Transition::SetBlocked);
        self.check();
    }

    /// Registra a espera por `events` em `obj` e bloqueia.
    ///
    /// `obj == None` aceita qualquer canal.
    pub fn wait(&mut self, handle: ThreadHandle, events: Events, obj: Option<WaitObj>) {
        let index = self.resolve(handle, Transition::Wait);
        {
            let t = self.slot_mut(index);
            t.events = events;
            t.event_obj = obj;
        }
        self.make_blocked(index, Transition::Wait);
        self.check();
    }

    /// Acorda, numa única passada, toda thread bloqueada que espera algum
    /// evento de `mask` em `obj` (ou em qualquer canal).
    ///
    /// BLOCKED vai para o fim da fila de prontos; BLOCKED_SUSP vira
    /// READY_SUSP sem trocar de fila; READY_SUSP é ignorada.
    /// Devolve quantas threads foram acordadas.
    pub fn unblock_all(&mut self, obj: WaitObj, mask: Events) -> usize {
        let mut woken = 0;
        let mut cursor = self.blocked.head();
        while let Some(index) = cursor {
            // Sucessor capturado antes de qualquer remoção
            cursor = self.blocked.next_of(&self.threads, index);

            let t = self.slot_mut(index);
            if !t.waits_for(obj, mask) {
                continue;
            }
            let state = t.state;
            match state {
                ThreadState::BlockedSusp => {
                    t.state = ThreadState::ReadySusp;
                    t.clear_wait();
                    woken += 1;
                }
                ThreadState::Blocked => {
                    t.clear_wait();
                    t.state = ThreadState::Ready;
                    self.blocked.remove(&mut self.threads, index);
                    self.ready.append(&mut self.threads, index);
                    woken += 1;
                }
                _ => {}
            }
        }
        if woken > 0 {
            crate::ktrace!("(Sched) unblock_all acordou=", woken);
        }
        self.check();
        woken
    }

    /// Suspende (`true`) ou retoma (`false`) uma thread.
    ///
    /// Suspender ou retomar a thread RUNNING é fatal; os demais estados que
    /// já estão no destino são no-op.
    pub fn set_suspended(&mut self, handle: ThreadHandle, suspend: bool) {
        let op = if suspend {
            Transition::Suspend
        } else {
            Transition::Resume
        };
        let index = self.resolve(handle, op);
        let state = self.state_at(index);

        if suspend {
            match state {
                ThreadState::Ready => {
                    self.ready.remove(&mut self.threads, index);
                    self.slot_mut(index).state = ThreadState::ReadySusp;
                    self.blocked.append(&mut self.threads, index);
                }
                ThreadState::Blocked => self.slot_mut(index).state = ThreadState::BlockedSusp,
                ThreadState::Zombie => self.slot_mut(index).state = ThreadState::ZombieSusp,
                ThreadState::ReadySusp | ThreadState::BlockedSusp | ThreadState::ZombieSusp => {}
                ThreadState::Running => self.violation(op, index),
            }
        } else {
            match state {
                ThreadState::ReadySusp => {
                    self.blocked.remove(&mut self.threads, index);
                    self.slot_mut(index).state = ThreadState::Ready;
                    self.ready.append(&mut self.threads, index);
                }
                ThreadState::BlockedSusp => self.slot_mut(index).state = ThreadState::Blocked,
                ThreadState::ZombieSusp => self.slot_mut(index).state = ThreadState::Zombie,
                ThreadState::Ready | ThreadState::Blocked | ThreadState::Zombie => {}
                ThreadState::Running => self.violation(op, index),
            }
        }
        self.check();
    }

    /// Retira a thread da fila em que está, sem mudar o estado.
    ///
    /// A thread fica desligada das filas até `kill` ou `destroy`; qualquer
    /// outra transição sobre ela é fatal.
    pub fn remove_thread(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::Remove);
        self.detach(index);
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Escolhe a próxima thread a executar e a marca RUNNING.
    ///
    /// A thread que sai, se ainda RUNNING, vai para o fim da fila de
    /// prontos. Sem prontos: zumbi saindo → fallback; caso contrário → idle.
    /// Essas duas entram na CPU emprestadas, em qualquer estado: não mudam
    /// de estado nem de fila e mantêm a espera registrada.
    pub fn pick_next(&mut self) -> ThreadHandle {
        let outgoing = self.current;
        let mut outgoing_zombie = false;

        if let Some(out) = outgoing {
            let state = self.state_at(out);
            outgoing_zombie = state.is_zombie();
            self.demote(out);
        }
        self.loaned = false;

        let next = match self.ready.dequeue(&mut self.threads) {
            Some(index) => {
                self.slot_mut(index).state = ThreadState::Running;
                index
            }
            None => {
                let target = if outgoing_zombie {
                    self.fallback
                } else {
                    self.idle
                };
                let Some(target) = target else {
                    fatal(SchedFault::NoDispatchTarget { outgoing_zombie });
                };
                if outgoing_zombie {
                    crate::kdebug!("(Sched) fila vazia, zumbi saindo: fallback");
                }
                self.loaned = true;
                target
            }
        };

        self.slot_mut(next).accounting.account_dispatch();
        self.current = Some(next);
        self.check();
        self.threads.handle_of(next)
    }

    /// Força a troca para `handle` (entrega de sinal, boot).
    ///
    /// A thread atual, se RUNNING, volta para a fila de prontos.
    pub fn switch_to(&mut self, handle: ThreadHandle) {
        let index = self.resolve(handle, Transition::SetRunning);
        if self.current == Some(index) {
            self.make_running(index, Transition::SetRunning);
            self.loaned = false;
            self.check();
            return;
        }
        if let Some(out) = self.current {
            self.demote(out);
        }
        self.loaned = false;
        self.make_running(index, Transition::SetRunning);
        self.slot_mut(index).accounting.account_dispatch();
        self.current = Some(index);
        self.check();
    }

    // =========================================================================
    // CONSULTAS
    // =========================================================================

    pub fn current(&self) -> Option<ThreadHandle> {
        self.current.map(|i| self.threads.handle_of(i))
    }

    pub fn idle(&self) -> Option<ThreadHandle> {
        self.idle.map(|i| self.threads.handle_of(i))
    }

    pub fn fallback(&self) -> Option<ThreadHandle> {
        self.fallback.map(|i| self.threads.handle_of(i))
    }

    /// A thread atual está na CPU emprestada (idle ou fallback)
    pub fn is_loaned(&self) -> bool {
        self.current.is_some() && self.loaned
    }

    pub fn thread(&self, handle: ThreadHandle) -> Option<&Thread> {
        self.threads.get(handle)
    }

    /// Acesso mutável a campos da arquitetura (contexto, stack)
    pub fn thread_mut(&mut self, handle: ThreadHandle) -> Option<&mut Thread> {
        self.threads.get_mut(handle)
    }

    /// Estado da thread. Handle inválido é fatal.
    pub fn state(&self, handle: ThreadHandle) -> ThreadState {
        match self.threads.get(handle) {
            Some(t) => t.state,
            None => fatal(SchedFault::StaleHandle {
                op: Transition::Dispatch,
                handle,
            }),
        }
    }

    pub fn by_tid(&self, tid: Tid) -> Option<ThreadHandle> {
        self.threads.by_tid(tid)
    }

    /// Threads de um processo, em ordem de TID
    pub fn threads_of(&self, pid: Pid) -> Vec<ThreadHandle> {
        self.threads
            .iter()
            .filter(|(_, t)| t.pid == pid)
            .map(|(h, _)| h)
            .collect()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    /// TIDs na fila de prontos, da cabeça para a cauda
    pub fn ready_order(&self) -> Vec<Tid> {
        self.ready.iter(&self.threads).map(|t| t.tid).collect()
    }

    /// TIDs na fila de bloqueados, da cabeça para a cauda
    pub fn blocked_order(&self) -> Vec<Tid> {
        self.blocked.iter(&self.threads).map(|t| t.tid).collect()
    }

    /// Confere elos das duas filas e a pertinência de cada thread.
    pub fn verify(&self) -> bool {
        if !self.ready.verify(&self.threads) || !self.blocked.verify(&self.threads) {
            return false;
        }
        self.threads.iter().all(|(_, t)| {
            if t.link.detached {
                t.link.queue.is_none()
            } else {
                t.link.queue == t.state.queue()
            }
        })
    }

    // =========================================================================
    // INTERNOS
    // =========================================================================

    fn resolve(&self, handle: ThreadHandle, op: Transition) -> SlotIdx {
        if !self.threads.contains(handle) {
            fatal(SchedFault::StaleHandle { op, handle });
        }
        handle.index()
    }

    fn slot_mut(&mut self, index: SlotIdx) -> &mut Thread {
        match self.threads.at_mut(index) {
            Some(t) => t,
            None => fatal(SchedFault::DanglingLink { index }),
        }
    }

    fn state_at(&self, index: SlotIdx) -> ThreadState {
        match self.threads.at(index) {
            Some(t) => t.state,
            None => fatal(SchedFault::DanglingLink { index }),
        }
    }

    fn tid_at(&self, index: SlotIdx) -> Tid {
        match self.threads.at(index) {
            Some(t) => t.tid,
            None => fatal(SchedFault::DanglingLink { index }),
        }
    }

    fn violation(&self, op: Transition, index: SlotIdx) -> ! {
        fatal(SchedFault::InvalidTransition {
            op,
            tid: self.tid_at(index),
            state: self.state_at(index),
        })
    }

    fn reject_detached(&self, index: SlotIdx, op: Transition) {
        if self.threads.at(index).map_or(false, |t| t.link.detached) {
            self.violation(op, index);
        }
    }

    fn make_running(&mut self, index: SlotIdx, op: Transition) {
        self.reject_detached(index, op);
        match self.state_at(index) {
            ThreadState::Running => {}
            ThreadState::Ready => {
                self.ready.remove(&mut self.threads, index);
                self.slot_mut(index).state = ThreadState::Running;
            }
            ThreadState::Blocked => {
                self.blocked.remove(&mut self.threads, index);
                let t = self.slot_mut(index);
                t.clear_wait();
                t.state = ThreadState::Running;
            }
            _ => self.violation(op, index),
        }
    }

    fn make_ready(&mut self, index: SlotIdx, front: bool, op: Transition) {
        self.reject_detached(index, op);
        match self.state_at(index) {
            ThreadState::Ready | ThreadState::ReadySusp => return,
            // Continua na fila de bloqueados até ser retomada
            ThreadState::BlockedSusp => {
                let t = self.slot_mut(index);
                t.clear_wait();
                t.state = ThreadState::ReadySusp;
                return;
            }
            ThreadState::Blocked => {
                self.blocked.remove(&mut self.threads, index);
                self.slot_mut(index).clear_wait();
            }
            ThreadState::Running => {}
            _ => self.violation(op, index),
        }
        self.slot_mut(index).state = ThreadState::Ready;
        if front {
            self.ready.prepend(&mut self.threads, index);
        } else {
            self.ready.append(&mut self.threads, index);
        }
    }

    fn make_blocked(&mut self, index: SlotIdx, op: Transition) {
        self.reject_detached(index, op);
        match self.state_at(index) {
            ThreadState::Blocked | ThreadState::BlockedSusp => {}
            ThreadState::ReadySusp => self.slot_mut(index).state = ThreadState::BlockedSusp,
            ThreadState::Ready => {
                self.ready.remove(&mut self.threads, index);
                self.slot_mut(index).state = ThreadState::Blocked;
                self.blocked.append(&mut self.threads, index);
            }
            ThreadState::Running => {
                self.slot_mut(index).state = ThreadState::Blocked;
                self.blocked.append(&mut self.threads, index);
            }
            _ => self.violation(op, index),
        }
    }

    /// Retira da fila conforme o estado e marca como desligada.
    fn detach(&mut self, index: SlotIdx) {
        if self.threads.at(index).map_or(false, |t| t.link.detached) {
            return;
        }
        let state = self.state_at(index);
        match state {
            ThreadState::Ready => self.ready.remove(&mut self.threads, index),
            ThreadState::Blocked | ThreadState::BlockedSusp | ThreadState::ReadySusp => {
                self.blocked.remove(&mut self.threads, index)
            }
            ThreadState::Running | ThreadState::Zombie | ThreadState::ZombieSusp => {}
        }
        if state.queue().is_some() {
            self.slot_mut(index).link.detached = true;
        }
    }

    /// A thread que sai perde a CPU: RUNNING volta para a fila.
    fn demote(&mut self, index: SlotIdx) {
        if self.loaned {
            self.slot_mut(index).accounting.account_switch(true);
            return;
        }
        let running = self.state_at(index) == ThreadState::Running;
        self.slot_mut(index).accounting.account_switch(!running);
        if !running {
            return;
        }
        if Some(index) == self.idle {
            self.slot_mut(index).state = ThreadState::Blocked;
            self.blocked.append(&mut self.threads, index);
        } else {
            self.slot_mut(index).state = ThreadState::Ready;
            self.ready.append(&mut self.threads, index);
        }
    }

    #[inline]
    fn check(&self) {
        if QUEUE_CHECKS && !self.verify() {
            let (tid, expected, found) = self
                .threads
                .iter()
                .find(|(_, t)| !t.link.detached && t.link.queue != t.state.queue())
                .map(|(_, t)| (t.tid, t.state.queue(), t.link.queue))
                .unwrap_or((Tid::new(0), None, None));
            fatal(SchedFault::QueueCorrupted {
                tid,
                expected,
                found,
            });
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_worker() -> (Scheduler, ThreadHandle) {
        let mut sched = Scheduler::new();
        sched.spawn_idle(Pid::KERNEL);
        let worker = sched.spawn(Pid::new(3), "w");
        assert_eq!(sched.pick_next(), worker);
        (sched, worker)
    }

    #[test]
    #[should_panic(expected = "transição inválida: suspend")]
    fn suspending_running_thread_is_fatal() {
        let (mut sched, worker) = running_worker();
        sched.set_suspended(worker, true);
    }

    #[test]
    #[should_panic(expected = "transição inválida: set_ready")]
    fn ready_on_zombie_is_fatal() {
        let (mut sched, worker) = running_worker();
        sched.kill(worker);
        sched.set_ready(worker);
    }

    #[test]
    #[should_panic(expected = "transição inválida: set_running")]
    fn running_a_suspended_thread_is_fatal() {
        let mut sched = Scheduler::new();
        let t = sched.spawn(Pid::new(3), "t");
        sched.set_suspended(t, true);
        sched.set_running(t);
    }

    #[test]
    #[should_panic(expected = "transição inválida: destroy")]
    fn destroying_current_is_fatal() {
        let (mut sched, worker) = running_worker();
        sched.destroy(worker);
    }

    #[test]
    #[should_panic(expected = "handle inválido")]
    fn stale_handle_is_fatal() {
        let mut sched = Scheduler::new();
        let t = sched.spawn(Pid::new(3), "t");
        sched.destroy(t);
        sched.set_blocked(t);
    }

    #[test]
    #[should_panic(expected = "sem thread para despachar")]
    fn empty_queue_without_idle_is_fatal() {
        let mut sched = Scheduler::new();
        sched.pick_next();
    }

    #[test]
    #[should_panic(expected = "transição inválida: set_blocked")]
    fn transitions_on_detached_thread_are_fatal() {
        let mut sched = Scheduler::new();
        let t = sched.spawn(Pid::new(3), "t");
        sched.remove_thread(t);
        sched.set_blocked(t);
    }

    #[test]
    fn remove_thread_detaches_by_state() {
        let mut sched = Scheduler::new();
        let ready = sched.spawn(Pid::new(3), "r");
        let susp = sched.spawn(Pid::new(3), "s");
        sched.set_suspended(susp, true);
        assert_eq!(sched.blocked_len(), 1);

        sched.remove_thread(ready);
        sched.remove_thread(susp);
        assert_eq!(sched.ready_len(), 0);
        assert_eq!(sched.blocked_len(), 0);
        assert!(sched.verify());

        sched.kill(susp);
        assert_eq!(sched.state(susp), ThreadState::ZombieSusp);
        sched.destroy(ready);
        assert!(sched.verify());
    }

    #[test]
    fn preemption_counts_involuntary_switches() {
        let mut sched = Scheduler::new();
        let a = sched.spawn(Pid::new(3), "a");
        let b = sched.spawn(Pid::new(3), "b");
        sched.pick_next();
        sched.pick_next();
        sched.wait(b, Events::CLIENT, None);
        sched.pick_next();

        let acc_a = sched.thread(a).map(|t| t.accounting).unwrap_or_default();
        let acc_b = sched.thread(b).map(|t| t.accounting).unwrap_or_default();
        assert_eq!(acc_a.involuntary_switches, 1);
        assert_eq!(acc_b.voluntary_switches, 1);
        assert_eq!(acc_a.dispatches, 2);
    }

    #[test]
    fn switch_to_forces_blocked_thread() {
        let (mut sched, worker) = running_worker();
        let sig = sched.spawn(Pid::new(4), "sig");
        sched.wait(sig, Events::USER2, None);

        sched.switch_to(sig);
        assert_eq!(sched.current(), Some(sig));
        assert_eq!(sched.state(sig), ThreadState::Running);
        assert_eq!(sched.state(worker), ThreadState::Ready);
        assert!(sched.thread(sig).map_or(false, |t| t.events().is_empty()));
    }

    #[test]
    fn switch_from_loaned_idle_keeps_it_parked() {
        let mut sched = Scheduler::new();
        let idle = sched.spawn_idle(Pid::KERNEL);
        let t = sched.spawn(Pid::new(3), "t");
        sched.wait(t, Events::CLIENT, None);
        assert_eq!(sched.pick_next(), idle);
        assert!(sched.is_loaned());

        sched.switch_to(t);
        assert!(!sched.is_loaned());
        assert_eq!(sched.state(t), ThreadState::Running);
        assert_eq!(sched.state(idle), ThreadState::Blocked);
        let idle_tid = sched.thread(idle).map(|x| x.tid).unwrap();
        assert_eq!(sched.blocked_order(), [idle_tid]);
    }

    #[test]
    fn threads_of_filters_by_pid() {
        let mut sched = Scheduler::new();
        let a = sched.spawn(Pid::new(3), "a");
        sched.spawn(Pid::new(4), "b");
        let c = sched.spawn(Pid::new(3), "c");
        assert_eq!(sched.threads_of(Pid::new(3)), [a, c]);
    }
}
