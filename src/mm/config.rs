//! # Configuração do Módulo de Memória
//!
//! Define constantes de layout, limites e a configuração de runtime do VMM.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: u64 = !(PAGE_SIZE as u64 - 1);

// =============================================================================
// LAYOUT DO ESPAÇO DE USUÁRIO
// =============================================================================
//
//  0x1000            text → rodata → data (data cresce para cima)
//  FREE_AREA_BEGIN   shm, device, phys, tls, bibliotecas
//  FREE_AREA_END
//  STACK_AREA_BEGIN  slots de stack (um por thread, de cima para baixo)
//  STACK_AREA_END
//

/// Início da região de texto
pub const TEXT_BEGIN: u64 = 0x0000_0000_0000_1000;

/// Início da área livre (limite de crescimento de data)
pub const FREE_AREA_BEGIN: u64 = 0x0000_0100_0000_0000;

/// Fim da área livre
pub const FREE_AREA_END: u64 = 0x0000_6000_0000_0000;

/// Início da área de stacks
pub const STACK_AREA_BEGIN: u64 = FREE_AREA_END;

/// Fim da área de stacks (exclusivo)
pub const STACK_AREA_END: u64 = 0x0000_7FFF_0000_0000;

/// Páginas máximas de uma stack
pub const MAX_STACK_PAGES: usize = 2048;

/// Espaço virtual reservado por stack (inclui uma guard page)
pub const STACK_SLOT_SIZE: u64 = ((MAX_STACK_PAGES + 1) * PAGE_SIZE) as u64;

// =============================================================================
// LIMITES
// =============================================================================

/// Números de região fixos
pub const RNO_TEXT: usize = 0;
pub const RNO_RODATA: usize = 1;
pub const RNO_DATA: usize = 2;

/// Primeiro número de região dinâmico
pub const RNO_FIRST_DYNAMIC: usize = 3;

/// Máximo de regiões por processo
pub const MAX_REGUSE_COUNT: usize = 8192;

// =============================================================================
// CONFIGURAÇÃO DE RUNTIME
// =============================================================================

/// Marcas d'água de frames livres (em frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWatermarks {
    /// Abaixo disso: reclaim urgente
    pub min: usize,
    /// Abaixo disso: swapper deve trabalhar
    pub low: usize,
    /// Acima disso: swapper pode dormir
    pub high: usize,
}

impl MemoryWatermarks {
    pub const fn new(min: usize, low: usize, high: usize) -> Self {
        Self { min, low, high }
    }
}

impl Default for MemoryWatermarks {
    fn default() -> Self {
        Self::new(4, 16, 32)
    }
}

/// Configuração do VMM
#[derive(Debug, Clone, Copy)]
pub struct VmmConfig {
    /// Semente do gerador usado na escolha de páginas para swap
    pub rng_seed: u64,
    /// Marcas d'água para classificação de pressão
    pub watermarks: MemoryWatermarks,
    /// Tenta swap-out de uma vítima quando um fault não consegue frame
    pub direct_reclaim: bool,
}

impl Default for VmmConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5EED_F0E6_E000_0001,
            watermarks: MemoryWatermarks::default(),
            direct_reclaim: true,
        }
    }
}
