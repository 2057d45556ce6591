// Path: crates/telemetry/src/time.rs
use crate::sinks::CommitteeMetricsSink;
use std::time::Instant;

/// Reports the lifetime of a block-processing scope to the committee sink.
pub struct BlockTimer<'a> {
    sink: &'a dyn CommitteeMetricsSink,
    start: Instant,
}

impl<'a> BlockTimer<'a> {
    pub fn new(sink: &'a dyn CommitteeMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for BlockTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_block_duration(self.start.elapsed().as_secs_f64());
    }
}
