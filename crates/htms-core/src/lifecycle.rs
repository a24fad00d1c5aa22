//! Per-document timing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Phases a document goes through in the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing emitted yet.
    Start,
    /// Structural markup is streaming.
    Streaming,
    /// Tasks are running.
    Flushing,
    /// Output is closed.
    Completion,
}

/// Timing marks for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct PipelineTiming {
    start: Instant,
    marks: HashMap<&'static str, Instant>,
}

impl PipelineTiming {
    /// Start timing now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a mark. The first occurrence wins.
    pub fn mark(&mut self, name: &'static str) {
        self.marks.entry(name).or_insert_with(Instant::now);
    }

    /// Time from start to a mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Time to the first emitted chunk.
    pub fn time_to_first_chunk(&self) -> Option<Duration> {
        self.since_start("first_chunk")
    }

    /// Time spent running tasks.
    pub fn flush_duration(&self) -> Option<Duration> {
        let flush = self.marks.get("flush_start")?;
        let end = self.marks.get("flush_end")?;
        Some(end.duration_since(*flush))
    }

    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_mark_wins() {
        let mut timing = PipelineTiming::new();
        timing.mark("first_chunk");
        let first = timing.time_to_first_chunk().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        timing.mark("first_chunk");
        assert_eq!(timing.time_to_first_chunk().unwrap(), first);
    }

    #[test]
    fn test_flush_duration_requires_both_marks() {
        let mut timing = PipelineTiming::new();
        assert!(timing.flush_duration().is_none());
        timing.mark("flush_start");
        assert!(timing.flush_duration().is_none());
        timing.mark("flush_end");
        assert!(timing.flush_duration().is_some());
    }
}
