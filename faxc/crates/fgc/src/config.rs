//! GC tuning knobs: an initial ~10 MB threshold, subsequently 1.5x the
//! last post-collection size.

#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    pub initial_threshold_bytes: usize,
    pub growth_factor: f64,
    /// Size, in bytes, of the frame bump-stack backing buffer.
    pub stack_bytes: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            initial_threshold_bytes: 10 * 1024 * 1024,
            growth_factor: 1.5,
            stack_bytes: 16 * 1024 * 1024,
        }
    }
}
