//! Minimal GC statistics, logged with `tracing` at each collection
//! (`-v`'s "cycle count" surfaces this via `faxc-drv`).

#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    pub collections_run: u64,
    pub objects_freed_total: u64,
    pub bytes_freed_total: u64,
}

impl GcStats {
    pub fn record_collection(&mut self, objects_freed: usize, bytes_freed: usize) {
        self.collections_run += 1;
        self.objects_freed_total += objects_freed as u64;
        self.bytes_freed_total += bytes_freed as u64;
        tracing::debug!(
            collection = self.collections_run,
            objects_freed,
            bytes_freed,
            "gc cycle complete"
        );
    }
}
