//! Constantes de configuração do Scheduler

/// Tamanho máximo do nome de debug de uma thread (bytes, inclui terminador)
pub const MAX_THREAD_NAME: usize = 32;

/// Capacidade inicial reservada na tabela de threads
pub const INITIAL_THREAD_SLOTS: usize = 64;

/// Verificação O(n) de pertinência a cada operação de fila.
///
/// Sempre ligada em builds de debug; em release apenas com `queue_checks`.
pub const QUEUE_CHECKS: bool = cfg!(any(debug_assertions, feature = "queue_checks"));
