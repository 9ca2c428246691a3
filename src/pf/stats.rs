/// Buffer-pool I/O counters, reset at the start of a timed region and read
/// by the benchmark harness afterward. Mirrors `PF_logicalReads` et al. and
/// the `PFbufStatsInit`/read-after-timed-region protocol from the original
/// C sources.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PfStats {
    pub logical_reads: u64,
    pub physical_reads: u64,
    pub logical_writes: u64,
    pub physical_writes: u64,
}

impl PfStats {
    pub fn pages_accessed(&self) -> u64 {
        self.physical_reads + self.physical_writes
    }

    pub(super) fn reset(&mut self) {
        *self = PfStats::default();
    }
}
