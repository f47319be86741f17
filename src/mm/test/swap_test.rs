//! Testes de swap-out/in e seleção de vítimas

use core::sync::atomic::Ordering;

use super::{vmm, vmm_with, P1};
use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::addr::{FrameNo, VirtAddr};
use crate::mm::config::{MemoryWatermarks, VmmConfig, PAGE_SIZE};
use crate::mm::error::MmError;
use crate::mm::fault::{AccessType, FaultAction, FaultError};
use crate::mm::io::{MemBinaryStore, NoWait};
use crate::mm::pfm::FramePool;
use crate::mm::reclaim::MemoryPressure;
use crate::mm::region::{PageState, RegionId, RegionType};
use crate::mm::swap::{MemSwapDevice, SwapSpace};
use crate::mm::vmm::Vmm;
use crate::sys::types::Pid;

/// Testes de swap
pub const SWAP_TESTS: &[TestCase] = &[
    TestCase::new("swap_round_trip", test_round_trip),
    TestCase::new("swap_out_rejects_pinned_pages", test_rejects_pinned),
    TestCase::new("swap_lru_region", test_lru_region),
    TestCase::new("swap_page_index_eligible_only", test_page_index),
    TestCase::new("swap_balance_watermarks", test_balance),
    TestCase::new("swap_clone_of_swapped_page", test_clone_swapped),
    TestCase::new("swap_cow_survivor_is_evictable", test_cow_survivor),
    TestCase::new("swap_full", test_swap_full),
    TestCase::new("swap_device_failure", test_device_failure),
];

const PS: u64 = PAGE_SIZE as u64;

fn at(base: VirtAddr, offset: u64) -> VirtAddr {
    VirtAddr::new(base.as_u64() + offset)
}

/// Região de dados com `pages` páginas, as `touched` primeiras escritas com
/// o próprio índice + 1. Devolve (id, início).
fn data_region(vmm: &mut Vmm, pid: Pid, pages: usize, touched: usize) -> Option<(RegionId, VirtAddr)> {
    let rno = vmm.add(pid, None, pages * PAGE_SIZE, RegionType::Data).ok()?;
    let (start, _) = vmm.reg_range(pid, rno)?;
    for i in 0..touched {
        vmm.copy_to_user(pid, at(start, i as u64 * PS), &[i as u8 + 1], &NoWait)
            .ok()?;
    }
    let id = vmm.region(pid, rno)?.id();
    Some((id, start))
}

fn read_byte(vmm: &mut Vmm, pid: Pid, addr: VirtAddr) -> Option<u8> {
    let mut b = [0u8; 1];
    vmm.copy_from_user(pid, addr, &mut b, &NoWait).ok()?;
    Some(b[0])
}

fn test_round_trip() -> TestResult {
    let mut vmm = vmm(8, 4);
    let Some((id, start)) = data_region(&mut vmm, P1, 2, 2) else {
        return TestResult::Fail;
    };
    ensure!(vmm.frames().free_frames() == 6, "(Swap) frames antes do swap-out");

    ensure!(vmm.swap_out(id, 0, &NoWait).is_ok(), "(Swap) swap_out");
    ensure!(vmm.translate(P1, start).is_none(), "(Swap) página continuou mapeada");
    ensure!(
        vmm.page_of(P1, start).is_some_and(|p| matches!(p.state, PageState::Swapped(_))),
        "(Swap) página não marcada como no swap"
    );
    ensure!(vmm.frames().free_frames() == 7, "(Swap) frame não devolvido");
    ensure!(vmm.swap().free_slots() == 3, "(Swap) slot não ocupado");

    ensure!(read_byte(&mut vmm, P1, start) == Some(1), "(Swap) conteúdo perdido");
    ensure!(vmm.swap().free_slots() == 4, "(Swap) slot não liberado no swap-in");
    ensure!(vmm.translate(P1, start).is_some(), "(Swap) página não remapeada");

    // Fault direto em página no swap
    ensure!(vmm.swap_out(id, 1, &NoWait).is_ok(), "(Swap) swap_out página 1");
    ensure!(
        vmm.resolve_fault(P1, at(start, PS), AccessType::Write, &NoWait)
            == Ok(FaultAction::SwappedIn),
        "(Swap) fault não trouxe a página"
    );
    ensure!(read_byte(&mut vmm, P1, at(start, PS)) == Some(2), "(Swap) conteúdo da página 1");

    let stats = vmm.stats();
    ensure!(stats.swap_outs == 2 && stats.swap_ins == 2, "(Swap) estatísticas");
    ensure!(
        vmm.swap_in(id, 1, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) swap_in de página presente"
    );
    TestResult::Pass
}

fn test_rejects_pinned() -> TestResult {
    let mut vmm = vmm(16, 8);
    let Some((id, _)) = data_region(&mut vmm, P1, 2, 1) else {
        return TestResult::Fail;
    };
    ensure!(
        vmm.swap_out(id, 1, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) página ausente foi para o swap"
    );
    ensure!(
        vmm.swap_out(RegionId(999), 0, &NoWait) == Err(MmError::RegionNotFound),
        "(Swap) região inexistente"
    );

    // Após fork a página é COW nos dois lados
    ensure!(vmm.clone_all(P1, Pid(12)).is_ok(), "(Swap) clone_all");
    ensure!(
        vmm.swap_out(id, 0, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) página COW foi para o swap"
    );

    let (Ok(device), Ok(phys)) = (
        vmm.add_phys(P1, Some(FrameNo::new(0x9000)), PAGE_SIZE),
        vmm.add_phys(P1, None, 2 * PAGE_SIZE),
    ) else {
        return TestResult::Fail;
    };
    let (Some(device), Some(phys)) = (vmm.region(P1, device), vmm.region(P1, phys)) else {
        return TestResult::Fail;
    };
    let (device, phys) = (device.id(), phys.id());
    ensure!(
        vmm.swap_out(device, 0, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) frame de dispositivo foi para o swap"
    );
    ensure!(
        vmm.swap_out(phys, 1, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) memória física contígua foi para o swap"
    );
    ensure!(vmm.select_swap_victim().is_none(), "(Swap) vítima entre páginas fixas");
    ensure!(vmm.swap().free_slots() == 8, "(Swap) slot vazou");
    TestResult::Pass
}

fn test_lru_region() -> TestResult {
    let mut vmm = vmm(16, 8);
    let (Some((first, _)), Some((second, _))) = (
        data_region(&mut vmm, P1, 1, 1),
        data_region(&mut vmm, Pid(11), 1, 1),
    ) else {
        return TestResult::Fail;
    };

    ensure!(vmm.lru_region_global() == Some(first), "(Swap) LRU deveria ser a primeira");
    ensure!(vmm.lru_region(Pid(11)) == Some(second), "(Swap) LRU por processo");

    vmm.set_timestamp(P1);
    ensure!(vmm.lru_region_global() == Some(second), "(Swap) timestamp não atualizado");
    ensure!(
        vmm.select_swap_victim() == Some((second, 0)),
        "(Swap) vítima fora da região LRU"
    );

    // Região sem páginas residentes não concorre
    ensure!(vmm.swap_out(second, 0, &NoWait).is_ok(), "(Swap) swap_out");
    ensure!(vmm.lru_region_global() == Some(first), "(Swap) região vazia escolhida");
    ensure!(vmm.lru_region(Pid(11)).is_none(), "(Swap) processo sem páginas");
    TestResult::Pass
}

fn test_page_index() -> TestResult {
    let mut vmm = vmm(16, 8);
    let Some((id, start)) = data_region(&mut vmm, P1, 4, 0) else {
        return TestResult::Fail;
    };
    ensure!(vmm.page_index_for_swap(id).is_none(), "(Swap) região sem páginas residentes");

    for page in [0u64, 2] {
        ensure!(
            vmm.copy_to_user(P1, at(start, page * PS), &[7], &NoWait).is_ok(),
            "(Swap) escrita"
        );
    }
    let mut seen = [false; 4];
    for _ in 0..32 {
        let Some(index) = vmm.page_index_for_swap(id) else {
            return TestResult::Fail;
        };
        ensure!(index == 0 || index == 2, "(Swap) página ausente sorteada");
        seen[index] = true;
    }
    ensure!(seen[0] && seen[2], "(Swap) sorteio não cobriu as páginas elegíveis");
    TestResult::Pass
}

fn test_balance() -> TestResult {
    let config = VmmConfig {
        watermarks: MemoryWatermarks::new(1, 2, 4),
        ..VmmConfig::default()
    };
    let mut vmm = vmm_with(8, 8, config, false);
    ensure!(vmm.pressure() == MemoryPressure::None, "(Swap) pressão inicial");
    ensure!(vmm.balance(&NoWait) == 0, "(Swap) balance sem pressão");

    let Some((_, start)) = data_region(&mut vmm, P1, 8, 6) else {
        return TestResult::Fail;
    };
    ensure!(vmm.pressure() == MemoryPressure::Medium, "(Swap) pressão média");
    ensure!(vmm.balance(&NoWait) == 3, "(Swap) balance deveria expulsar 3");
    ensure!(vmm.frames().free_frames() == 5, "(Swap) frames após balance");
    ensure!(vmm.pressure() == MemoryPressure::None, "(Swap) pressão após balance");
    ensure!(vmm.balance(&NoWait) == 0, "(Swap) balance repetido");

    // Só três páginas continuam residentes
    ensure!(vmm.evict_pages(100, &NoWait) == 3, "(Swap) evict_pages");
    ensure!(vmm.swap().free_slots() == 2, "(Swap) slots ocupados");

    for i in 0..6u64 {
        ensure!(
            read_byte(&mut vmm, P1, at(start, i * PS)) == Some(i as u8 + 1),
            "(Swap) conteúdo perdido"
        );
    }
    ensure!(
        vmm.copy_to_user(P1, at(start, 6 * PS), &[1], &NoWait).is_ok(),
        "(Swap) página 7"
    );
    ensure!(vmm.pressure() == MemoryPressure::Critical, "(Swap) pressão crítica");
    TestResult::Pass
}

fn test_clone_swapped() -> TestResult {
    let child = Pid(12);
    let mut vmm = vmm(8, 4);
    let Some((id, start)) = data_region(&mut vmm, P1, 1, 1) else {
        return TestResult::Fail;
    };
    ensure!(vmm.swap_out(id, 0, &NoWait).is_ok(), "(Swap) swap_out");

    ensure!(vmm.clone_all(P1, child).is_ok(), "(Swap) clone_all");
    ensure!(
        vmm.page_of(child, start)
            .is_some_and(|p| matches!(p.state, PageState::Present(_)) && !p.is_cow()),
        "(Swap) filho deveria ter cópia privada"
    );
    ensure!(
        vmm.page_of(P1, start).is_some_and(|p| matches!(p.state, PageState::Swapped(_))),
        "(Swap) pai perdeu a página no swap"
    );
    ensure!(vmm.swap().free_slots() == 3, "(Swap) slot do pai liberado");
    ensure!(read_byte(&mut vmm, child, start) == Some(1), "(Swap) conteúdo do filho");

    ensure!(
        vmm.remove_all(child).is_ok() && vmm.remove_all(P1).is_ok(),
        "(Swap) remove_all"
    );
    ensure!(vmm.frames().free_frames() == 8, "(Swap) frames vazaram");
    ensure!(vmm.swap().free_slots() == 4, "(Swap) slots vazaram");
    TestResult::Pass
}

/// Depois que o filho sai, a página COW do pai volta a ser expulsável
fn test_cow_survivor() -> TestResult {
    let child = Pid(13);
    let mut vmm = vmm(8, 4);
    let Some((id, start)) = data_region(&mut vmm, P1, 1, 1) else {
        return TestResult::Fail;
    };
    ensure!(vmm.clone_all(P1, child).is_ok(), "(Swap) clone_all");
    ensure!(vmm.lru_region(P1).is_none(), "(Swap) página compartilhada elegível");
    ensure!(
        vmm.swap_out(id, 0, &NoWait) == Err(MmError::InvalidPageState),
        "(Swap) frame compartilhado saiu para o swap"
    );

    ensure!(vmm.remove_all(child).is_ok(), "(Swap) remove_all do filho");
    ensure!(vmm.cow().tracked() == 0, "(Swap) frame ainda rastreado");
    ensure!(vmm.lru_region(P1) == Some(id), "(Swap) região do pai não elegível");
    ensure!(vmm.select_swap_victim() == Some((id, 0)), "(Swap) vítima errada");
    ensure!(vmm.swap_out(id, 0, &NoWait).is_ok(), "(Swap) swap_out do sobrevivente");

    ensure!(read_byte(&mut vmm, P1, start) == Some(1), "(Swap) conteúdo perdido");
    ensure!(
        vmm.page_of(P1, start)
            .is_some_and(|p| matches!(p.state, PageState::Present(_)) && !p.is_cow()),
        "(Swap) página voltou ainda COW"
    );
    ensure!(
        vmm.copy_to_user(P1, start, &[7], &NoWait).is_ok(),
        "(Swap) escrita após swap-in"
    );
    ensure!(vmm.stats().cow_copies == 0, "(Swap) cópia COW desnecessária");
    TestResult::Pass
}

fn test_swap_full() -> TestResult {
    let mut vmm = vmm(8, 1);
    let Some((id, start)) = data_region(&mut vmm, P1, 2, 2) else {
        return TestResult::Fail;
    };
    ensure!(vmm.swap_out(id, 0, &NoWait).is_ok(), "(Swap) primeiro swap_out");
    ensure!(
        vmm.swap_out(id, 1, &NoWait) == Err(MmError::SwapFull),
        "(Swap) área cheia não reportada"
    );
    ensure!(
        vmm.translate(P1, at(start, PS)).is_some(),
        "(Swap) página perdeu o mapeamento"
    );
    ensure!(read_byte(&mut vmm, P1, at(start, PS)) == Some(2), "(Swap) conteúdo");
    TestResult::Pass
}

fn test_device_failure() -> TestResult {
    let device = MemSwapDevice::new(2);
    let fail = device.fault_switch();
    let mut vmm = Vmm::new(
        FramePool::new(FrameNo::new(0x100), 8),
        MemBinaryStore::new(),
        SwapSpace::new(device),
        VmmConfig::default(),
    );
    ensure!(vmm.create_process(P1).is_ok(), "(Swap) create_process");
    let Some((id, start)) = data_region(&mut vmm, P1, 1, 1) else {
        return TestResult::Fail;
    };

    fail.store(true, Ordering::Relaxed);
    ensure!(vmm.swap_out(id, 0, &NoWait) == Err(MmError::Io), "(Swap) falha de escrita");
    ensure!(vmm.swap().free_slots() == 2, "(Swap) slot vazou na falha");
    ensure!(vmm.translate(P1, start).is_some(), "(Swap) página desmapeada na falha");

    fail.store(false, Ordering::Relaxed);
    ensure!(vmm.swap_out(id, 0, &NoWait).is_ok(), "(Swap) swap_out");
    let free = vmm.frames().free_frames();

    fail.store(true, Ordering::Relaxed);
    ensure!(
        vmm.resolve_fault(P1, start, AccessType::Read, &NoWait) == Err(FaultError::Io),
        "(Swap) falha de leitura"
    );
    ensure!(vmm.frames().free_frames() == free, "(Swap) frame vazou na falha");
    ensure!(vmm.swap().stats().io_errors == 2, "(Swap) erros de I/O");

    fail.store(false, Ordering::Relaxed);
    ensure!(read_byte(&mut vmm, P1, start) == Some(1), "(Swap) conteúdo após falha");
    TestResult::Pass
}
