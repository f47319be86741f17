//! # Drivers do Núcleo
//!
//! O núcleo mantém apenas o sink de diagnóstico. UART, timer e controladores
//! de interrupção pertencem à camada de arquitetura, que registra a porta de
//! saída em [`serial::register`] durante o early-boot.
//!
//! ```text
//! kinfo!/kwarn!/... ──▶ serial::emit_* ──▶ SerialPort (arch)
//! ```

pub mod serial;
