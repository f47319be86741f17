//! Testes do resolvedor de page faults

use core::cell::Cell;

use spin::Mutex;

use super::{image_byte, image_desc, vmm, vmm_with, IMAGE, IMAGE_PAGES, P1, P2};
use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::VirtAddr;
use crate::mm::config::{VmmConfig, PAGE_SIZE, TEXT_BEGIN};
use crate::mm::fault::{AccessType, FaultAction, FaultError};
use crate::mm::io::{IoWait, NoWait};
use crate::mm::region::{BinDesc, PageFlags, PageState, RegionType};
use crate::sched::task::{ThreadHandle, ThreadState};
use crate::sched::{Scheduler, ThreadIoWait};
use crate::sys::types::Pid;

/// Testes de page fault
pub const FAULT_TESTS: &[TestCase] = &[
    TestCase::new("fault_demand_load", test_demand_load),
    TestCase::new("fault_cow_isolation", test_cow_isolation),
    TestCase::new("fault_protection", test_protection),
    TestCase::new("fault_io_error", test_io_error),
    TestCase::new("fault_direct_reclaim", test_direct_reclaim),
    TestCase::new("fault_oom", test_oom),
    TestCase::new("fault_blocks_thread_during_io", test_blocks_thread),
    TestCase::new("fault_suspended_during_io", test_suspended_during_io),
];

const PS: u64 = PAGE_SIZE as u64;

fn at(base: VirtAddr, offset: u64) -> VirtAddr {
    VirtAddr::new(base.as_u64() + offset)
}

fn read_byte(vmm: &mut crate::mm::vmm::Vmm, pid: Pid, addr: VirtAddr) -> Option<u8> {
    let mut b = [0u8; 1];
    vmm.copy_from_user(pid, addr, &mut b, &NoWait).ok()?;
    Some(b[0])
}

fn test_demand_load() -> TestResult {
    let mut vmm = vmm(16, 0);
    // Binário cobre página 0 e 10 bytes da página 1; a página 2 é bss
    let desc = BinDesc {
        file: IMAGE,
        offset: 0,
        load_bytes: PAGE_SIZE + 10,
    };
    ensure!(
        vmm.add(P1, Some(desc), IMAGE_PAGES * PAGE_SIZE, RegionType::Text).is_ok(),
        "(Fault) add text"
    );
    let text = VirtAddr::new(TEXT_BEGIN);

    ensure!(
        vmm.resolve_fault(P1, at(text, PS + 4), AccessType::Read, &NoWait)
            == Ok(FaultAction::DemandLoaded),
        "(Fault) página 1 não foi carregada do binário"
    );
    let mut buf = [0xFFu8; 16];
    ensure!(
        vmm.copy_from_user(P1, at(text, PS), &mut buf, &NoWait).is_ok(),
        "(Fault) leitura da página 1"
    );
    ensure!(
        (0..10).all(|i| buf[i] == image_byte(PAGE_SIZE + i)),
        "(Fault) conteúdo carregado difere do binário"
    );
    ensure!(buf[10..].iter().all(|&b| b == 0), "(Fault) resto da página não zerado");

    ensure!(
        vmm.resolve_fault(P1, at(text, 2 * PS), AccessType::Execute, &NoWait)
            == Ok(FaultAction::ZeroFilled),
        "(Fault) página além do binário não foi zerada"
    );
    ensure!(
        vmm.page_of(P1, at(text, 2 * PS))
            .is_some_and(|p| !p.flags.contains(PageFlags::DEMAND_LOAD)),
        "(Fault) DEMAND_LOAD ficou na página"
    );

    // Fault em página já presente só refaz o mapeamento
    ensure!(
        vmm.resolve_fault(P1, at(text, PS), AccessType::Read, &NoWait)
            == Ok(FaultAction::Remapped),
        "(Fault) fault espúrio"
    );
    let stats = vmm.stats();
    ensure!(stats.demand_loads == 1 && stats.zero_fills == 1, "(Fault) estatísticas");
    TestResult::Pass
}

fn test_cow_isolation() -> TestResult {
    let mut vmm = vmm(16, 0);
    let Ok(data) = vmm.add(P1, None, 2 * PAGE_SIZE, RegionType::Data) else {
        return TestResult::Fail;
    };
    let Some((start, _)) = vmm.reg_range(P1, data) else {
        return TestResult::Fail;
    };
    ensure!(
        vmm.copy_to_user(P1, start, &[0xAA], &NoWait).is_ok()
            && vmm.copy_to_user(P1, at(start, PS), &[0x11], &NoWait).is_ok(),
        "(Fault) escrita inicial"
    );
    let Some(original) = vmm.translate(P1, start).map(|pte| pte.frame) else {
        return TestResult::Fail;
    };

    ensure!(vmm.clone_all(P1, P2).is_ok(), "(Fault) clone_all");
    ensure!(
        vmm.translate(P1, start).is_some_and(|pte| !pte.is_writable()),
        "(Fault) pai continuou gravável após fork"
    );
    ensure!(
        vmm.translate(P2, start).is_some_and(|pte| pte.frame == original),
        "(Fault) filho não compartilha o frame"
    );
    ensure!(vmm.cow().sharers(original) == 2, "(Fault) refcount COW");
    ensure!(vmm.frames().free_frames() == 14, "(Fault) fork copiou frames");

    // Filho escreve: cópia privada
    ensure!(
        vmm.resolve_fault(P2, start, AccessType::Write, &NoWait) == Ok(FaultAction::CowCopied),
        "(Fault) escrita do filho não copiou"
    );
    ensure!(vmm.copy_to_user(P2, start, &[0xBB], &NoWait).is_ok(), "(Fault) escrita do filho");
    ensure!(read_byte(&mut vmm, P1, start) == Some(0xAA), "(Fault) escrita do filho vazou");
    ensure!(read_byte(&mut vmm, P2, start) == Some(0xBB), "(Fault) filho perdeu a escrita");

    // Pai é agora o único dono: assume o frame sem copiar
    ensure!(
        vmm.resolve_fault(P1, start, AccessType::Write, &NoWait) == Ok(FaultAction::CowReused),
        "(Fault) último dono copiou"
    );
    ensure!(
        vmm.translate(P1, start).is_some_and(|pte| pte.frame == original && pte.is_writable()),
        "(Fault) pai não recuperou o frame"
    );

    // Segunda página: pai escreve primeiro
    ensure!(
        vmm.copy_to_user(P1, at(start, PS), &[0x22], &NoWait).is_ok(),
        "(Fault) escrita do pai"
    );
    ensure!(read_byte(&mut vmm, P2, at(start, PS)) == Some(0x11), "(Fault) escrita do pai vazou");
    ensure!(
        vmm.resolve_fault(P2, at(start, PS), AccessType::Write, &NoWait)
            == Ok(FaultAction::CowReused),
        "(Fault) filho último dono"
    );
    ensure!(vmm.cow().tracked() == 0, "(Fault) refcount COW ficou");
    ensure!(vmm.frames().free_frames() == 12, "(Fault) frames após COW");

    ensure!(vmm.remove_all(P2).is_ok() && vmm.remove_all(P1).is_ok(), "(Fault) remove_all");
    ensure!(vmm.frames().free_frames() == 16, "(Fault) frames vazaram");
    TestResult::Pass
}

fn test_protection() -> TestResult {
    let mut vmm = vmm(16, 0);
    let bytes = IMAGE_PAGES * PAGE_SIZE;
    let (Ok(_), Ok(data)) = (
        vmm.add(P1, Some(image_desc()), bytes, RegionType::Text),
        vmm.add(P1, None, PAGE_SIZE, RegionType::Data),
    ) else {
        return TestResult::Fail;
    };
    let Some((start, _)) = vmm.reg_range(P1, data) else {
        return TestResult::Fail;
    };
    let text = VirtAddr::new(TEXT_BEGIN);

    ensure!(
        vmm.resolve_fault(P1, text, AccessType::Write, &NoWait)
            == Err(FaultError::ProtectionViolation),
        "(Fault) escrita em text"
    );
    ensure!(
        vmm.resolve_fault(P1, start, AccessType::Execute, &NoWait)
            == Err(FaultError::ProtectionViolation),
        "(Fault) execução em data"
    );
    ensure!(
        vmm.resolve_fault(P1, VirtAddr::new(0x10), AccessType::Read, &NoWait)
            == Err(FaultError::NoRegion),
        "(Fault) endereço nulo"
    );
    ensure!(
        vmm.resolve_fault(Pid(99), text, AccessType::Read, &NoWait) == Err(FaultError::NoRegion),
        "(Fault) processo inexistente"
    );
    ensure!(vmm.stats().segfaults == 4, "(Fault) contagem de segfaults");
    ensure!(vmm.frames().free_frames() == 16, "(Fault) fault recusado alocou frame");
    TestResult::Pass
}

fn test_io_error() -> TestResult {
    let mut vmm = vmm_with(16, 0, VmmConfig::default(), true);
    ensure!(
        vmm.add(P1, Some(image_desc()), IMAGE_PAGES * PAGE_SIZE, RegionType::Text).is_ok(),
        "(Fault) add text"
    );
    let text = VirtAddr::new(TEXT_BEGIN);
    ensure!(
        vmm.resolve_fault(P1, text, AccessType::Read, &NoWait) == Err(FaultError::Io),
        "(Fault) erro de leitura não reportado"
    );
    ensure!(vmm.frames().free_frames() == 16, "(Fault) frame vazou no erro de I/O");
    ensure!(
        vmm.page_of(P1, text).is_some_and(|p| p.state == PageState::Absent
            && p.flags.contains(PageFlags::DEMAND_LOAD)),
        "(Fault) página mudou de estado após erro"
    );
    ensure!(vmm.translate(P1, text).is_none(), "(Fault) página mapeada após erro");
    TestResult::Pass
}

fn test_direct_reclaim() -> TestResult {
    let mut vmm = vmm(4, 8);
    let Ok(data) = vmm.add(P1, None, 6 * PAGE_SIZE, RegionType::Data) else {
        return TestResult::Fail;
    };
    let Some((start, _)) = vmm.reg_range(P1, data) else {
        return TestResult::Fail;
    };
    for i in 0..4u64 {
        ensure!(
            vmm.copy_to_user(P1, at(start, i * PS), &[i as u8 + 1], &NoWait).is_ok(),
            "(Fault) escrita antes da pressão"
        );
    }
    ensure!(vmm.frames().free_frames() == 0, "(Fault) pool deveria estar cheio");

    ensure!(
        vmm.resolve_fault(P1, at(start, 4 * PS), AccessType::Write, &NoWait)
            == Ok(FaultAction::ZeroFilled),
        "(Fault) reclaim direto não liberou frame"
    );
    ensure!(vmm.stats().direct_reclaims == 1, "(Fault) contagem de reclaim direto");
    ensure!(vmm.swap().free_slots() == 7, "(Fault) vítima não foi para o swap");

    // Páginas expulsas voltam com o conteúdo
    for i in 0..4u64 {
        ensure!(
            read_byte(&mut vmm, P1, at(start, i * PS)) == Some(i as u8 + 1),
            "(Fault) conteúdo perdido no swap"
        );
    }
    TestResult::Pass
}

fn test_oom() -> TestResult {
    let config = VmmConfig {
        direct_reclaim: false,
        ..VmmConfig::default()
    };
    let mut no_reclaim = vmm_with(1, 8, config, false);
    let Ok(data) = no_reclaim.add(P1, None, 2 * PAGE_SIZE, RegionType::Data) else {
        return TestResult::Fail;
    };
    let Some((start, _)) = no_reclaim.reg_range(P1, data) else {
        return TestResult::Fail;
    };
    ensure!(no_reclaim.copy_to_user(P1, start, &[1], &NoWait).is_ok(), "(Fault) primeira página");
    ensure!(
        no_reclaim.resolve_fault(P1, at(start, PS), AccessType::Write, &NoWait)
            == Err(FaultError::OutOfMemory),
        "(Fault) OOM sem reclaim"
    );

    // Sem swap o reclaim direto não tem para onde mandar a vítima
    let mut vmm = vmm(1, 0);
    let Ok(data) = vmm.add(P1, None, 2 * PAGE_SIZE, RegionType::Data) else {
        return TestResult::Fail;
    };
    let Some((start, _)) = vmm.reg_range(P1, data) else {
        return TestResult::Fail;
    };
    ensure!(vmm.copy_to_user(P1, start, &[1], &NoWait).is_ok(), "(Fault) primeira página");
    ensure!(
        vmm.resolve_fault(P1, at(start, PS), AccessType::Write, &NoWait)
            == Err(FaultError::OutOfMemory),
        "(Fault) OOM sem swap"
    );
    ensure!(read_byte(&mut vmm, P1, start) == Some(1), "(Fault) página residente perdida");
    TestResult::Pass
}

/// Registra o estado da thread no meio do I/O
struct Probe<'a> {
    inner: ThreadIoWait<'a>,
    sched: &'a Mutex<Scheduler>,
    thread: ThreadHandle,
    suspend: bool,
    seen: Cell<Option<ThreadState>>,
}

impl<'a> Probe<'a> {
    fn new(sched: &'a Mutex<Scheduler>, thread: ThreadHandle, suspend: bool) -> Self {
        Self {
            inner: ThreadIoWait::new(sched, thread),
            sched,
            thread,
            suspend,
            seen: Cell::new(None),
        }
    }
}

impl IoWait for Probe<'_> {
    fn begin_io(&self, channel: u64) {
        self.inner.begin_io(channel);
        let mut sched = self.sched.lock();
        if self.suspend {
            sched.set_suspended(self.thread, true);
        }
        self.seen.set(Some(sched.state(self.thread)));
    }

    fn end_io(&self, channel: u64) {
        self.inner.end_io(channel);
    }
}

/// Scheduler com idle e uma thread RUNNING de P1
fn running_thread() -> (Mutex<Scheduler>, ThreadHandle) {
    let mut sched = Scheduler::new();
    sched.spawn_idle(Pid::KERNEL);
    let thread = sched.spawn(P1, "faulter");
    sched.pick_next();
    (Mutex::new(sched), thread)
}

fn test_blocks_thread() -> TestResult {
    let (sched, thread) = running_thread();
    let mut vmm = vmm(16, 0);
    ensure!(
        vmm.add(P1, Some(image_desc()), IMAGE_PAGES * PAGE_SIZE, RegionType::Text).is_ok(),
        "(Fault) add text"
    );

    let probe = Probe::new(&sched, thread, false);
    ensure!(
        vmm.resolve_fault(P1, VirtAddr::new(TEXT_BEGIN), AccessType::Read, &probe)
            == Ok(FaultAction::DemandLoaded),
        "(Fault) demand load"
    );
    ensure!(
        probe.seen.get() == Some(ThreadState::Blocked),
        "(Fault) thread não bloqueou durante o I/O"
    );
    let sched = sched.lock();
    ensure!(sched.state(thread) == ThreadState::Ready, "(Fault) thread não acordou");
    ensure!(sched.blocked_len() == 1, "(Fault) só a idle deveria estar bloqueada");
    ensure!(sched.verify(), "(Fault) filas inconsistentes");
    TestResult::Pass
}

fn test_suspended_during_io() -> TestResult {
    let (sched, thread) = running_thread();
    let mut vmm = vmm(16, 0);
    ensure!(
        vmm.add(P1, Some(image_desc()), IMAGE_PAGES * PAGE_SIZE, RegionType::Text).is_ok(),
        "(Fault) add text"
    );

    let probe = Probe::new(&sched, thread, true);
    ensure!(
        vmm.resolve_fault(P1, VirtAddr::new(TEXT_BEGIN), AccessType::Read, &probe)
            == Ok(FaultAction::DemandLoaded),
        "(Fault) demand load"
    );
    ensure!(
        probe.seen.get() == Some(ThreadState::BlockedSusp),
        "(Fault) suspensão durante I/O"
    );

    let mut sched = sched.lock();
    ensure!(
        sched.state(thread) == ThreadState::ReadySusp,
        "(Fault) fim do I/O não deixou a thread READY_SUSP"
    );
    ensure!(sched.ready_len() == 0, "(Fault) thread suspensa entrou em ready");
    sched.set_suspended(thread, false);
    ensure!(sched.state(thread) == ThreadState::Ready, "(Fault) resume");
    ensure!(sched.verify(), "(Fault) filas inconsistentes");
    TestResult::Pass
}
