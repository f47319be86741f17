//! Estados de thread

/// Estado de uma thread
///
/// Pertinência às filas é função do estado:
///
/// | Estado                                   | Fila           |
/// |------------------------------------------|----------------|
/// | `Ready`                                  | ready          |
/// | `Blocked`, `BlockedSusp`, `ReadySusp`    | blocked        |
/// | `Running`, `Zombie`, `ZombieSusp`        | nenhuma        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Executando na CPU
    Running,
    /// Pronta para executar
    Ready,
    /// Pronta, mas suspensa administrativamente
    ReadySusp,
    /// Bloqueada esperando evento
    Blocked,
    /// Bloqueada e suspensa
    BlockedSusp,
    /// Terminada, esperando cleanup
    Zombie,
    /// Terminada e suspensa
    ZombieSusp,
}

/// Fila que deve conter uma thread em determinado estado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Ready,
    Blocked,
}

impl ThreadState {
    /// Verifica se está suspensa
    pub const fn is_suspended(self) -> bool {
        matches!(self, Self::ReadySusp | Self::BlockedSusp | Self::ZombieSusp)
    }

    pub const fn is_zombie(self) -> bool {
        matches!(self, Self::Zombie | Self::ZombieSusp)
    }

    /// Fila exigida por este estado
    pub const fn queue(self) -> Option<QueueKind> {
        match self {
            Self::Ready => Some(QueueKind::Ready),
            Self::Blocked | Self::BlockedSusp | Self::ReadySusp => Some(QueueKind::Blocked),
            Self::Running | Self::Zombie | Self::ZombieSusp => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Ready => "READY",
            Self::ReadySusp => "READY_SUSP",
            Self::Blocked => "BLOCKED",
            Self::BlockedSusp => "BLOCKED_SUSP",
            Self::Zombie => "ZOMBIE",
            Self::ZombieSusp => "ZOMBIE_SUSP",
        }
    }
}
