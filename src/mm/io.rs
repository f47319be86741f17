//! Colaboradores de I/O do VMM
//!
//! O VMM não conhece sistemas de arquivos nem discos. Demand loading lê de um
//! [`BinaryStore`]; o swap usa [`SwapDevice`](crate::mm::swap::SwapDevice).
//! Ambos são síncronos. Enquanto o I/O corre, a thread que causou o fault é
//! bloqueada através de [`IoWait`].

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::sys::types::{FileId, FileOffset};

/// Falha de I/O reportada por um colaborador
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    /// Arquivo/slot inexistente
    NotFound,
    /// Erro do dispositivo
    Device,
}

/// Fonte dos dados de regiões carregadas de binário
pub trait BinaryStore {
    /// Lê `buf.len()` bytes de `file` a partir de `offset`.
    ///
    /// Bytes além do fim do arquivo são zerados.
    fn read(&self, file: FileId, offset: FileOffset, buf: &mut [u8]) -> Result<(), IoError>;
}

/// Gancho de bloqueio em torno do I/O de paginação.
///
/// `channel` identifica a página; `end_io` acorda quem espera nele.
pub trait IoWait {
    fn begin_io(&self, channel: u64);
    fn end_io(&self, channel: u64);
}

/// Contexto sem thread para bloquear (kernel, boot, testes)
pub struct NoWait;

impl IoWait for NoWait {
    fn begin_io(&self, _channel: u64) {}
    fn end_io(&self, _channel: u64) {}
}

/// Store de binários em memória (initramfs, testes)
#[derive(Default)]
pub struct MemBinaryStore {
    files: BTreeMap<FileId, Vec<u8>>,
    fail: bool,
}

impl MemBinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: FileId, data: Vec<u8>) {
        self.files.insert(file, data);
    }

    /// Faz toda leitura seguinte falhar com `IoError::Device`
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl BinaryStore for MemBinaryStore {
    fn read(&self, file: FileId, offset: FileOffset, buf: &mut [u8]) -> Result<(), IoError> {
        if self.fail {
            return Err(IoError::Device);
        }
        let data = self.files.get(&file).ok_or(IoError::NotFound)?;
        buf.fill(0);
        let start = (offset as usize).min(data.len());
        let end = (start + buf.len()).min(data.len());
        buf[..end - start].copy_from_slice(&data[start..end]);
        Ok(())
    }
}
