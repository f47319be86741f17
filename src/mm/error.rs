//! Tipos de Erro do Subsistema de Memória
//!
//! Erros recuperáveis das operações de região. Falhas de page fault têm tipo
//! próprio ([`FaultError`](crate::mm::fault::FaultError)).

/// Erros do subsistema de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem memória física disponível (OOM)
    OutOfMemory,
    /// Processo sem slot de região livre
    NoFreeSlot,
    /// Sem espaço virtual para a região
    NoVirtualSpace,
    /// Região sobrepõe outra
    RegionOverlap,
    /// text/rodata/data fora de ordem
    InvalidRegionOrder,
    /// Número de região fixo já em uso
    RegionExists,
    /// Região inexistente
    RegionNotFound,
    /// Processo sem espaço de endereçamento
    NoSuchProcess,
    /// Processo já possui espaço de endereçamento
    ProcessExists,
    /// Tamanho inválido (zero ou muito grande)
    InvalidSize,
    /// Região não pode crescer
    NotGrowable,
    /// Região não pode ser compartilhada
    NotShareable,
    /// Proteção não pode ser alterada para este tipo de região
    ProtectionLocked,
    /// Página não está no estado exigido pela operação
    InvalidPageState,
    /// Área de swap cheia
    SwapFull,
    /// Falha de I/O no backing store
    Io,
    /// Parâmetro inválido
    InvalidParameter,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem frames físicos disponíveis",
            Self::NoFreeSlot => "Sem slot de região livre",
            Self::NoVirtualSpace => "Sem espaço virtual livre",
            Self::RegionOverlap => "Região sobrepõe outra",
            Self::InvalidRegionOrder => "Ordem text/rodata/data violada",
            Self::RegionExists => "Região já existe",
            Self::RegionNotFound => "Região não encontrada",
            Self::NoSuchProcess => "Processo sem espaço de endereçamento",
            Self::ProcessExists => "Espaço de endereçamento já existe",
            Self::InvalidSize => "Tamanho inválido",
            Self::NotGrowable => "Região não pode crescer",
            Self::NotShareable => "Região não compartilhável",
            Self::ProtectionLocked => "Proteção da região é fixa",
            Self::InvalidPageState => "Estado de página inválido para a operação",
            Self::SwapFull => "Área de swap cheia",
            Self::Io => "Falha de I/O",
            Self::InvalidParameter => "Parâmetro inválido",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<crate::mm::io::IoError> for MmError {
    fn from(_: crate::mm::io::IoError) -> Self {
        Self::Io
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;
