//! Forge Nucleus.
//!
//! Núcleo de escalonamento de threads e de memória virtual do Redstone OS.
//! Define a estrutura hierárquica dos subsistemas.
//!
//! Biblioteca `no_std` + `alloc`; a std só entra no harness de testes do host.

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Box/BTreeMap)
extern crate alloc;

// --- Saída de diagnóstico ---
pub mod drivers; // Sink serial dos logs

// --- Módulos Centrais ---
pub mod core; // Objeto do núcleo, logs
pub mod klib; // Utilitários Internos (Bitmaps, PRNG, Testes)
pub mod sys; // Identificadores (Pid, Tid, FileId)

// --- Subsistemas ---
pub mod mm; // Regiões, page faults, swap
pub mod sched; // Threads e filas

pub use crate::core::kernel::Kernel;

/// Executa todas as suites de self-test. Retorna `true` se nenhuma falhou.
#[cfg(feature = "self_test")]
pub fn run_self_tests() -> bool {
    let (sp, sf, ss) = sched::test::run_sched_tests();
    let (mp, mf, ms) = mm::test::run_memory_tests();

    crate::kinfo!("(SelfTest) passed=", (sp + mp) as u64);
    if ss + ms > 0 {
        crate::kwarn!("(SelfTest) skipped=", (ss + ms) as u64);
    }
    if sf + mf > 0 {
        crate::kerror!("(SelfTest) failed=", (sf + mf) as u64);
        return false;
    }
    crate::kok!("(SelfTest) Todas as suites passaram");
    true
}
