//! # Kernel Core Object
//!
//! Junta o scheduler e o VMM atrás dos dois locks do núcleo:
//!
//! | Lock        | Protege                         |
//! |-------------|---------------------------------|
//! | `vmm`       | Regiões, espaços, swap (paginação) |
//! | `sched`     | Threads e filas ready/blocked   |
//!
//! ## ⚠️ Ordem de locks
//! Paginação → scheduler, nunca o contrário. Todo método aqui que precisa
//! dos dois toma `vmm` primeiro; o resolvedor de faults só toca o scheduler
//! por [`ThreadIoWait`], que pega o lock dentro de cada chamada.

use alloc::vec::Vec;

use spin::{Mutex, Once};

use crate::mm::error::{MmError, MmResult};
use crate::mm::fault::{FaultAction, FaultError, PageFaultInfo};
use crate::mm::io::NoWait;
use crate::mm::reclaim::MemoryPressure;
use crate::mm::vmm::Vmm;
use crate::sched::task::{Events, ThreadHandle, WaitObj};
use crate::sched::{Scheduler, ThreadIoWait};
use crate::sys::types::Pid;

/// Canal em que o swapper dorme
pub const SWAPPER_CHANNEL: WaitObj = WaitObj::new(0x53_5741_5050);

/// Instância global, instalada uma vez no boot
static KERNEL: Once<Kernel> = Once::new();

/// Instala o núcleo. Chamadas seguintes são ignoradas.
pub fn install(kernel: Kernel) -> &'static Kernel {
    let k = KERNEL.call_once(|| kernel);
    crate::kok!("(Core) Núcleo instalado");
    k
}

/// Núcleo instalado, se houver
pub fn kernel() -> Option<&'static Kernel> {
    KERNEL.get()
}

pub struct Kernel {
    pub sched: Mutex<Scheduler>,
    pub vmm: Mutex<Vmm>,
}

impl Kernel {
    pub fn new(sched: Scheduler, vmm: Vmm) -> Self {
        Self {
            sched: Mutex::new(sched),
            vmm: Mutex::new(vmm),
        }
    }

    /// Cria o espaço de endereçamento e a primeira thread de um processo
    pub fn spawn_process(&self, pid: Pid, name: &str) -> MmResult<ThreadHandle> {
        self.vmm.lock().create_process(pid)?;
        let handle = self.sched.lock().spawn(pid, name);
        crate::kdebug!("(Core) Processo criado, pid=", pid.as_u32());
        Ok(handle)
    }

    /// Resolve um page fault da thread `thread`.
    ///
    /// Se houve I/O a thread bloqueou e já foi acordada: ao retornar ela
    /// está READY (ou READY_SUSP) e o chamador deve escalonar. O erro é para
    /// ser entregue ao processo como sinal.
    pub fn page_fault(
        &self,
        thread: ThreadHandle,
        info: &PageFaultInfo,
    ) -> Result<FaultAction, FaultError> {
        let pid = self
            .sched
            .lock()
            .thread(thread)
            .map(|t| t.pid)
            .ok_or(FaultError::NoRegion)?;

        let mut vmm = self.vmm.lock();
        let wait = ThreadIoWait::new(&self.sched, thread);
        vmm.resolve_fault(pid, info.addr, info.access, &wait)
    }

    /// Duplica o espaço de `parent` em `child` (fork)
    pub fn fork_address_space(&self, parent: Pid, child: Pid) -> MmResult<()> {
        self.vmm.lock().clone_all(parent, child)
    }

    /// Mata todas as threads do processo e desfaz seu espaço de
    /// endereçamento. Devolve quantas threads foram mortas.
    ///
    /// As threads viram zumbis; o slot é liberado depois com `destroy`.
    pub fn exit_process(&self, pid: Pid) -> MmResult<usize> {
        let mut vmm = self.vmm.lock();
        let mut sched = self.sched.lock();

        let idle = sched.idle();
        let threads: Vec<ThreadHandle> = sched
            .threads_of(pid)
            .into_iter()
            .filter(|&h| Some(h) != idle && !sched.state(h).is_zombie())
            .collect();
        for &handle in &threads {
            sched.kill(handle);
        }
        drop(sched);

        match vmm.remove_all(pid) {
            Ok(()) | Err(MmError::NoSuchProcess) => {}
            Err(e) => return Err(e),
        }
        crate::kdebug!("(Core) Processo encerrado, pid=", pid.as_u32());
        Ok(threads.len())
    }

    /// Acorda a thread para tratar um sinal.
    ///
    /// Com `immediate` a thread vai direto para a CPU; senão entra no início
    /// da fila de prontos. Zumbis ignoram sinais e threads suspensas só
    /// ficam prontas quando retomadas. Devolve se o sinal foi entregue.
    pub fn deliver_signal(&self, thread: ThreadHandle, immediate: bool) -> bool {
        let mut sched = self.sched.lock();
        if sched.thread(thread).is_none() {
            return false;
        }
        let state = sched.state(thread);
        if state.is_zombie() {
            return false;
        }
        if immediate && !state.is_suspended() {
            sched.switch_to(thread);
        } else {
            sched.set_ready_quick(thread);
        }
        true
    }

    /// Tick do timer: troca de thread, marca as regiões do processo que
    /// entra como recém-usadas e acorda o swapper se a memória está baixa.
    pub fn timer_tick(&self) -> ThreadHandle {
        let mut vmm = self.vmm.lock();
        let mut sched = self.sched.lock();

        let next = sched.pick_next();
        if let Some(pid) = sched.thread(next).map(|t| t.pid) {
            vmm.set_timestamp(pid);
        }
        if vmm.pressure() > MemoryPressure::Low {
            sched.unblock_all(SWAPPER_CHANNEL, Events::SWAP_WORK);
        }
        next
    }

    /// Thread do swapper vai dormir até o próximo aviso de pressão
    pub fn swapper_sleep(&self, thread: ThreadHandle) {
        self.sched
            .lock()
            .wait(thread, Events::SWAP_WORK, Some(SWAPPER_CHANNEL));
    }

    /// Uma rodada do swapper. Devolve quantas páginas saíram.
    pub fn swapper_run(&self) -> usize {
        self.vmm.lock().balance(&NoWait)
    }
}
