//! Ferramentas de Debug para o Scheduler

use super::scheduler::Scheduler;

impl Scheduler {
    /// Imprime o estado de todas as threads e das filas
    pub fn dump_queues(&self) {
        crate::ktrace!("--- [TRACE] SCHEDULER: LISTA COMPLETA ---");

        match self.current {
            Some(index) => {
                if let Some(t) = self.threads.at(index) {
                    crate::ktrace!("  - CURRENT TID:", t.tid.as_u32());
                    crate::ktrace!(t.state().as_str());
                }
            }
            None => crate::ktrace!("  - CURRENT: None"),
        }

        crate::ktrace!("  - READY count:", self.ready.len());
        for t in self.ready.iter(&self.threads) {
            crate::ktrace!("    -> TID:", t.tid.as_u32());
        }

        crate::ktrace!("  - BLOCKED count:", self.blocked.len());
        for t in self.blocked.iter(&self.threads) {
            crate::ktrace!("    -> TID:", t.tid.as_u32());
            crate::ktrace!(t.state().as_str());
            crate::ktrace!("       events:", t.events().bits());
        }

        crate::ktrace!("--- [TRACE] FIM DO DUMP ---");
    }
}
