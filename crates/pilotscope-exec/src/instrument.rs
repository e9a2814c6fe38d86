//! Whole-query execution timer and the slice of the host's query descriptor
//! that carries it.

use std::time::{Duration, Instant};

/// Accumulating wall-clock timer. The host starts and stops it around each
/// execution cycle; `end_loop` closes a cycle left open.
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    running_since: Option<Instant>,
    total: Duration,
    loops: u64,
}

impl Instrument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.total += since.elapsed();
        }
    }

    /// Add time measured elsewhere.
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
    }

    pub fn end_loop(&mut self) {
        self.stop();
        self.loops += 1;
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn loops(&self) -> u64 {
        self.loops
    }
}

/// Host query descriptor. `instrument` is `None` until someone asks for
/// timing.
#[derive(Debug, Clone, Default)]
pub struct QueryDesc {
    pub instrument: Option<Instrument>,
}

impl QueryDesc {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_cycles() {
        let mut instr = Instrument::new();
        instr.record(Duration::from_millis(40));
        instr.start();
        instr.end_loop();
        instr.record(Duration::from_millis(2));
        assert!(instr.total() >= Duration::from_millis(42));
        assert_eq!(instr.loops(), 1);

        // stop without start is a no-op
        let before = instr.total();
        instr.stop();
        assert_eq!(instr.total(), before);
    }
}
