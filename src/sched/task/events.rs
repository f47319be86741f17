//! Eventos e canais de espera

use bitflags::bitflags;

bitflags! {
    /// Máscara de eventos que uma thread bloqueada aguarda
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Events: u32 {
        /// Cliente conectou em um driver
        const CLIENT        = 1 << 0;
        /// Mensagem recebida
        const RECEIVED_MSG  = 1 << 1;
        /// Dados disponíveis para leitura
        const DATA_READABLE = 1 << 3;
        /// I/O de paginação (demand load / swap-in)
        const PAGE_IO       = 1 << 8;
        /// Trabalho para o swapper
        const SWAP_WORK     = 1 << 9;
        /// Eventos livres para usuário
        const USER1         = 1 << 14;
        const USER2         = 1 << 15;
    }
}

/// Canal de espera opaco (endereço de objeto, id de região, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WaitObj(pub u64);

impl WaitObj {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}
