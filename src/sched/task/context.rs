//! Contexto de CPU salvo
//!
//! O núcleo apenas guarda o blob. A troca de contexto em si (assembly) é da
//! camada de arquitetura.

/// Contexto de CPU (registradores callee-saved da SysV ABI)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuContext {
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,

    // Stack pointer
    pub rsp: u64,

    // Instruction pointer (return address)
    pub rip: u64,
}

impl CpuContext {
    pub const fn new() -> Self {
        Self {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rsp: 0,
            rip: 0,
        }
    }

    /// Configura para iniciar em `entry` com a stack `stack_top`
    pub fn setup(&mut self, entry: u64, stack_top: u64) {
        self.rip = entry;
        self.rsp = stack_top;
    }
}
