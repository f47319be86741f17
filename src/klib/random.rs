//! Gerador pseudo-aleatório (xorshift64*)
//!
//! Não criptográfico. Usado para escolher vítimas de swap.

/// Estado do gerador. Semente zero é substituída por uma constante fixa.
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    const FALLBACK_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

    pub const fn new(seed: u64) -> Self {
        let state = if seed == 0 { Self::FALLBACK_SEED } else { seed };
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Valor uniforme em `0..bound`. `bound` deve ser > 0.
    pub fn below(&mut self, bound: usize) -> usize {
        debug_assert!(bound > 0);
        // Rejeição para eliminar o viés do módulo
        let bound = bound as u64;
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let v = self.next_u64();
            if v < zone {
                return (v % bound) as usize;
            }
        }
    }
}
