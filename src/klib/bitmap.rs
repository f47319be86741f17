//! Bitmap genérico
//!
//! Usado pelo pool de frames e pela área de swap para rastrear slots livres.

use alloc::vec;
use alloc::vec::Vec;

/// Bitmap de tamanho fixo (bit 1 = ocupado)
pub struct Bitmap {
    data: Vec<u64>,
    len: usize,
    ones: usize,
}

impl Bitmap {
    /// Cria bitmap com `bits` bits zerados
    pub fn new(bits: usize) -> Self {
        Self {
            data: vec![0; (bits + 63) / 64],
            len: bits,
            ones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Quantidade de bits em 1
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    /// Define um bit
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let word = index / 64;
        let bit = index % 64;
        if self.data[word] & (1 << bit) == 0 {
            self.data[word] |= 1 << bit;
            self.ones += 1;
        }
    }

    /// Limpa um bit
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let word = index / 64;
        let bit = index % 64;
        if self.data[word] & (1 << bit) != 0 {
            self.data[word] &= !(1 << bit);
            self.ones -= 1;
        }
    }

    /// Testa um bit
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        let word = index / 64;
        let bit = index % 64;
        (self.data[word] & (1 << bit)) != 0
    }

    /// Encontra primeiro bit livre (0)
    pub fn find_first_zero(&self) -> Option<usize> {
        for (i, &word) in self.data.iter().enumerate() {
            if word != u64::MAX {
                let bit = word.trailing_ones() as usize;
                let index = i * 64 + bit;
                if index < self.len {
                    return Some(index);
                }
            }
        }
        None
    }

    /// Encontra `count` bits livres consecutivos
    pub fn find_zero_run(&self, count: usize) -> Option<usize> {
        if count == 0 || count > self.len {
            return None;
        }
        let mut start = 0;
        let mut run = 0;
        for index in 0..self.len {
            if self.test(index) {
                run = 0;
                start = index + 1;
            } else {
                run += 1;
                if run == count {
                    return Some(start);
                }
            }
        }
        None
    }
}
