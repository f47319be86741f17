//! # Multitasking & Scheduler Subsystem
//!
//! O módulo `sched` decide *qual* thread ocupa a CPU. Ele não troca contexto
//! (isso é da arquitetura): entrega ao chamador o handle da próxima thread e
//! mantém o estado de todas as outras coerente.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **TCB:** [`task::Thread`] guarda estado, máscara de eventos, canal de
//!   espera, elos de fila, stack do kernel e contexto salvo.
//! - **Filas:** uma fila `ready` e uma `blocked`, ambas intrusivas sobre a
//!   arena de threads ([`task::ThreadTable`]). Nenhuma operação de fila aloca.
//! - **Máquina de Estados:** `set_running`, `set_ready`, `set_ready_quick`,
//!   `set_blocked`, `set_suspended`, `unblock_all`, `remove_thread`.
//! - **Dispatch:** Round-Robin via [`Scheduler::pick_next`], com fallback
//!   para a thread designada quando a que sai é zumbi e para a idle quando
//!   não há prontos.
//!
//! ## 🏗️ Arquitetura
//!
//! ```text
//!            spawn                    wait / set_blocked
//!   ┌──────────────────▶ READY ◀──────────────────────────┐
//!   │                   │  ▲                              │
//!   │        pick_next  │  │ pick_next (preempção)        │
//!   │                   ▼  │                              │
//!   │                 RUNNING ─────────────────────▶ BLOCKED
//!   │                   │          unblock_all ◀─────────┘
//!   │                   ▼ kill
//!   │                 ZOMBIE ──▶ destroy
//!   │
//!   └─ suspend/resume: READY ⇄ READY_SUSP, BLOCKED ⇄ BLOCKED_SUSP,
//!                      ZOMBIE ⇄ ZOMBIE_SUSP
//! ```
//!
//! Uma instância de [`Scheduler`] protegida por um único `spin::Mutex`
//! (ver `core::kernel`). O resolvedor de page faults bloqueia threads apenas
//! através de [`ThreadIoWait`].
//!
//! ## ⚠️ Contratos
//! Transição ilegal, handle de thread destruída ou fila corrompida são bugs
//! do núcleo: [`error::fatal`] registra o diagnóstico (tid, operação,
//! estado) e aborta. Erros recuperáveis nunca passam por aqui.
//!
//! ## 🛠️ TODOs e Roadmap
//! - [ ] **TODO: (SMP)** Filas por CPU; hoje há um único par ready/blocked.

pub mod config;
pub mod core;
pub mod error;
pub mod task;

pub use self::core::{Scheduler, ThreadIoWait};
pub use error::{SchedFault, Transition};
pub use task::{Events, Thread, ThreadHandle, ThreadState, WaitObj};
