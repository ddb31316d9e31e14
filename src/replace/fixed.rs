use super::{scan_victim, LineState, Replace, Tick};

pub const DEFAULT_THRESHOLD: u32 = 14;

/// Reference-count admission with a threshold that never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedThreshold {
    threshold: u32,
}

impl FixedThreshold {
    pub fn new(threshold: u32) -> Self {
        FixedThreshold { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for FixedThreshold {
    fn default() -> Self {
        FixedThreshold::new(DEFAULT_THRESHOLD)
    }
}

impl Replace for FixedThreshold {
    fn install(&self, line: &mut LineState, _now: Tick) {
        line.install();
    }

    fn touch(&self, line: &mut LineState, now: Tick) {
        line.admit(self.threshold, now);
    }

    fn invalidate(&self, line: &mut LineState) {
        line.invalidate();
    }

    fn select_victim<'a, I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a LineState>,
    {
        scan_victim(candidates)
    }
}
