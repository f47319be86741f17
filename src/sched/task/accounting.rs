//! Contabilidade de Recursos (Accounting)
//!
//! Contadores de despacho e troca de contexto por thread.

/// Estatísticas de uso de uma thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accounting {
    /// Vezes que a thread foi escolhida pelo dispatcher
    pub dispatches: u64,

    /// Trocas voluntárias (bloqueou, terminou)
    pub voluntary_switches: u64,

    /// Trocas involuntárias (preempção com a thread ainda RUNNING)
    pub involuntary_switches: u64,
}

impl Accounting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra que a thread ganhou a CPU
    pub fn account_dispatch(&mut self) {
        self.dispatches += 1;
    }

    /// Registra que a thread perdeu a CPU
    pub fn account_switch(&mut self, voluntary: bool) {
        if voluntary {
            self.voluntary_switches += 1;
        } else {
            self.involuntary_switches += 1;
        }
    }
}
