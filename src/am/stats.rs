//! Benchmark-facing stats record, grounded in `amstats.c`/`amstats.h`: reset
//! the PF counters before a timed region, then capture elapsed time plus the
//! counters into a `Stats` value for the harness to print.

use std::time::Duration;

use crate::pf::PfStats;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub time_ms: f64,
    pub logical_reads: u64,
    pub physical_reads: u64,
    pub logical_writes: u64,
    pub physical_writes: u64,
}

impl Stats {
    pub fn pages_accessed(&self) -> u64 {
        self.physical_reads + self.physical_writes
    }

    pub fn capture(pf_stats: PfStats, elapsed: Duration) -> Self {
        Self {
            time_ms: elapsed.as_secs_f64() * 1000.0,
            logical_reads: pf_stats.logical_reads,
            physical_reads: pf_stats.physical_reads,
            logical_writes: pf_stats.logical_writes,
            physical_writes: pf_stats.physical_writes,
        }
    }
}
