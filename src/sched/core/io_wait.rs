//! Bloqueio de thread durante I/O de paginação
//!
//! O resolvedor de page faults só enxerga [`IoWait`]; esta é a ponte para
//! a API de transições do scheduler. O lock do scheduler é tomado apenas
//! dentro de cada chamada.

use spin::Mutex;

use super::scheduler::Scheduler;
use crate::mm::io::IoWait;
use crate::sched::task::{Events, ThreadHandle, WaitObj};

/// Bloqueia `thread` em `Events::PAGE_IO` enquanto o I/O está em curso.
pub struct ThreadIoWait<'a> {
    sched: &'a Mutex<Scheduler>,
    thread: ThreadHandle,
}

impl<'a> ThreadIoWait<'a> {
    pub fn new(sched: &'a Mutex<Scheduler>, thread: ThreadHandle) -> Self {
        Self { sched, thread }
    }
}

impl IoWait for ThreadIoWait<'_> {
    fn begin_io(&self, channel: u64) {
        self.sched
            .lock()
            .wait(self.thread, Events::PAGE_IO, Some(WaitObj::new(channel)));
    }

    fn end_io(&self, channel: u64) {
        self.sched
            .lock()
            .unblock_all(WaitObj::new(channel), Events::PAGE_IO);
    }
}
