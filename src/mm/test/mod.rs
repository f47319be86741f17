//! # Testes do Subsistema de Memória
//!
//! Organização modular dos testes:
//! - `region_test.rs` - Regiões: ordem, posicionamento, compartilhamento, crescimento
//! - `fault_test.rs` - Resolvedor de faults: demand load, COW, proteção, OOM, bloqueio
//! - `swap_test.rs` - Swap-out/in e seleção de vítimas
//!
//! Suites executadas no boot (feature `self_test`) e pelo harness do host.

use alloc::vec::Vec;

use crate::klib::test_framework::{run_test_suite, TestCase};
use crate::mm::addr::FrameNo;
use crate::mm::config::{VmmConfig, PAGE_SIZE};
use crate::mm::io::MemBinaryStore;
use crate::mm::pfm::FramePool;
use crate::mm::region::BinDesc;
use crate::mm::swap::{MemSwapDevice, SwapSpace};
use crate::mm::vmm::Vmm;
use crate::sys::types::{FileId, Pid};

macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            crate::kerror!($msg);
            return crate::klib::test_framework::TestResult::Fail;
        }
    };
}

pub mod fault_test;
pub mod swap_test;

/// Executa todas as suites de memória. Retorna (passed, failed, skipped).
pub fn run_memory_tests() -> (usize, usize, usize) {
    let suites: [(&str, &[TestCase]); 3] = [
        ("MM Regions", region_test::REGION_TESTS),
        ("MM Faults", fault_test::FAULT_TESTS),
        ("MM Swap", swap_test::SWAP_TESTS),
    ];
    let mut total = (0, 0, 0);
    for (name, tests) in suites {
        let (p, f, s) = run_test_suite(name, tests);
        total.0 += p;
        total.1 += f;
        total.2 += s;
    }
    total
}

// =============================================================================
// FIXTURES
// =============================================================================

/// Binário usado nos testes de demand loading
pub(crate) const IMAGE: FileId = FileId(1);

/// Páginas do binário de teste
pub(crate) const IMAGE_PAGES: usize = 3;

pub(crate) const P1: Pid = Pid(10);
pub(crate) const P2: Pid = Pid(11);

/// Byte `i` do binário de teste
pub(crate) fn image_byte(i: usize) -> u8 {
    (i % 251) as u8
}

pub(crate) fn image() -> Vec<u8> {
    (0..IMAGE_PAGES * PAGE_SIZE).map(image_byte).collect()
}

/// Região de texto carregada do binário inteiro
pub(crate) fn image_desc() -> BinDesc {
    BinDesc {
        file: IMAGE,
        offset: 0,
        load_bytes: IMAGE_PAGES * PAGE_SIZE,
    }
}

/// VMM com `frames` frames, `swap_slots` slots de swap e o binário de teste
pub(crate) fn vmm(frames: usize, swap_slots: usize) -> Vmm {
    vmm_with(frames, swap_slots, VmmConfig::default(), false)
}

pub(crate) fn vmm_with(frames: usize, swap_slots: usize, config: VmmConfig, failing_store: bool) -> Vmm {
    let mut store = MemBinaryStore::new();
    store.insert(IMAGE, image());
    store.set_failing(failing_store);
    let swap = if swap_slots > 0 {
        SwapSpace::new(MemSwapDevice::new(swap_slots))
    } else {
        SwapSpace::disabled()
    };
    let mut vmm = Vmm::new(FramePool::new(FrameNo::new(0x100), frames), store, swap, config);
    // Processos usados pelos testes
    let _ = vmm.create_process(P1);
    let _ = vmm.create_process(P2);
    vmm
}

#[cfg(test)]
mod host {
    use super::{fault_test, region_test, swap_test};
    use crate::klib::test_framework::assert_suite;

    #[test]
    fn mm_region_self_tests_pass() {
        assert_suite(region_test::REGION_TESTS);
    }

    #[test]
    fn mm_fault_self_tests_pass() {
        assert_suite(fault_test::FAULT_TESTS);
    }

    #[test]
    fn mm_swap_self_tests_pass() {
        assert_suite(swap_test::SWAP_TESTS);
    }
}
