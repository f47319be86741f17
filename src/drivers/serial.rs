// =============================================================================
// SERIAL SINK - ZERO OVERHEAD
// =============================================================================
//
// Saída de logging do núcleo.
//
// ARQUITETURA:
// O núcleo não conhece a UART. A camada de arquitetura registra uma única
// porta (`SerialPort`) durante o early-boot e todos os macros de log
// escrevem nela. Antes do registro (ou em testes que não registram nada)
// a saída é descartada.
//
// - SEM core::fmt - emit_hex formata à mão em buffer de pilha
// - SEM alocação
// - Registro único via spin::Once (leitura sem lock após o boot)
//
// FUNÇÕES DISPONÍVEIS:
// - emit(byte)       : Envia um byte
// - emit_str(s)      : Envia string
// - emit_hex(v)      : Envia u64 em hexadecimal (0x + 16 nibbles)
// - emit_nl()        : Envia newline (\r\n)
//
// =============================================================================

use spin::Once;

/// Porta de saída fornecida pela arquitetura (UART, console de debug, buffer).
pub trait SerialPort: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

static PORT: Once<&'static dyn SerialPort> = Once::new();

/// Registra a porta de saída. Apenas o primeiro registro tem efeito.
pub fn register(port: &'static dyn SerialPort) -> bool {
    let mut installed = false;
    PORT.call_once(|| {
        installed = true;
        port
    });
    installed
}

/// Indica se há porta registrada.
#[inline]
pub fn is_registered() -> bool {
    PORT.get().is_some()
}

#[inline]
pub fn emit(byte: u8) {
    if let Some(port) = PORT.get() {
        port.write_bytes(&[byte]);
    }
}

#[inline]
pub fn emit_str(s: &str) {
    if let Some(port) = PORT.get() {
        port.write_bytes(s.as_bytes());
    }
}

#[inline]
pub fn emit_nl() {
    emit_str("\r\n");
}

/// Envia `value` como `0x` seguido de 16 dígitos hexadecimais.
pub fn emit_hex(value: u64) {
    if let Some(port) = PORT.get() {
        port.write_bytes(&format_hex(value));
    }
}

fn format_hex(value: u64) -> [u8; 18] {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut buf = [0u8; 18];
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..16 {
        let shift = 60 - i * 4;
        buf[2 + i] = DIGITS[((value >> shift) & 0xF) as usize];
    }
    buf
}
