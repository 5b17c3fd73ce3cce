use crate::types::SpinReport;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Receives a report for every settled spin. Runs after the response as
/// deferred work and cannot influence the payout.
pub trait StatsSink: Send + Sync {
    fn record(&self, report: &SpinReport);
}

/// Writes spin reports to the audit log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditLog;

impl StatsSink for AuditLog {
    fn record(&self, report: &SpinReport) {
        let json = serde_json::to_string(report).unwrap_or_default();
        info!(
            target: "slotkeeper::audit",
            player = %report.player,
            payout = report.payout,
            balance = report.new_balance,
            "{}",
            json
        );
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    reports: Arc<Mutex<Vec<SpinReport>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<SpinReport> {
        self.reports
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl StatsSink for MemorySink {
    fn record(&self, report: &SpinReport) {
        let mut reports = self
            .reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reports.push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Grid, Symbol, WinKind};

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        let grid = Grid::new(Symbol::Cherry, Symbol::Cherry, Symbol::Lemon);
        let report = SpinReport {
            player: "p".into(),
            original_grid: grid,
            final_grid: grid,
            kind: WinKind::Pair(Symbol::Cherry),
            payout: 15,
            spin_cost: 10,
            multiplier: 1,
            free_spin_used: false,
            insurance_used: false,
            free_spins_awarded: 0,
            new_balance: 105,
            timestamp: 0,
        };
        sink.record(&report);
        AuditLog.record(&report);
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].payout, 15);
    }
}
