pub mod adaptive;
pub mod fixed;

use crate::feedback::FeedbackHandle;

pub use adaptive::AdaptiveThreshold;
pub use fixed::FixedThreshold;

/// Logical simulator time, supplied by the host on every access.
pub type Tick = u64;

/// Eviction priority of a line. Lower values are evicted first.
///
/// The derived ordering is `Invalidated < NotYetPromoted < PromotedAt(_)`,
/// with promoted lines ordered by the tick they were last promoted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Freshly instantiated or explicitly invalidated.
    Invalidated,
    /// Installed, or touched without crossing the admission threshold.
    NotYetPromoted,
    /// Crossed the threshold; protected by recency from this tick on.
    PromotedAt(Tick),
}

impl Priority {
    /// Legacy single-tick encoding: `0` invalidated, `1` not promoted.
    pub fn raw_tick(&self) -> Tick {
        match *self {
            Priority::Invalidated => 0,
            Priority::NotYetPromoted => 1,
            Priority::PromotedAt(tick) => tick,
        }
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self, Priority::PromotedAt(_))
    }
}

/// Replacement metadata carried by every line slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineState {
    ref_count: u32,
    priority: Priority,
}

impl LineState {
    pub fn new() -> Self {
        LineState {
            ref_count: 0,
            priority: Priority::Invalidated,
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    fn install(&mut self) {
        self.ref_count = 1;
        self.priority = Priority::NotYetPromoted;
    }

    fn invalidate(&mut self) {
        self.ref_count = 0;
        self.priority = Priority::Invalidated;
    }

    // Lines at or under the threshold stay maximally evictable however recent
    // the touch was.
    fn admit(&mut self, threshold: u32, now: Tick) {
        self.ref_count = self.ref_count.saturating_add(1);
        self.priority = if self.ref_count > threshold {
            Priority::PromotedAt(now)
        } else {
            Priority::NotYetPromoted
        };
    }
}

impl Default for LineState {
    fn default() -> Self {
        LineState::new()
    }
}

/// Lifecycle hooks a cache controller drives for each line.
pub trait Replace {
    fn instantiate(&self) -> LineState {
        LineState::new()
    }

    /// Called once per fill, after the victim is chosen.
    fn install(&self, line: &mut LineState, now: Tick);

    /// Called once per hit.
    fn touch(&self, line: &mut LineState, now: Tick);

    fn invalidate(&self, line: &mut LineState);

    /// Returns the index, in candidate order, of the line to evict.
    ///
    /// # Panics
    ///
    /// Panics if `candidates` is empty. A set always has at least one way.
    fn select_victim<'a, I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a LineState>;
}

// Strict less-than keeps the earliest candidate on ties.
fn scan_victim<'a, I>(candidates: I) -> usize
where
    I: IntoIterator<Item = &'a LineState>,
{
    let mut candidates = candidates.into_iter().enumerate();
    let (mut victim, first) = candidates
        .next()
        .unwrap_or_else(|| panic!("select_victim requires at least one eviction candidate"));
    let mut lowest = first.priority;
    for (idx, line) in candidates {
        if line.priority < lowest {
            victim = idx;
            lowest = line.priority;
        }
    }
    victim
}

/// A replacement policy chosen at construction time.
#[derive(Debug, Clone)]
pub enum Policy {
    Fixed(FixedThreshold),
    Adaptive(AdaptiveThreshold),
}

impl Policy {
    pub fn name(&self) -> &'static str {
        match self {
            Policy::Fixed(_) => "fixed",
            Policy::Adaptive(_) => "adaptive",
        }
    }

    /// The admission threshold currently in force.
    pub fn threshold(&self) -> u32 {
        match self {
            Policy::Fixed(fixed) => fixed.threshold(),
            Policy::Adaptive(adaptive) => adaptive.feedback().threshold(),
        }
    }

    pub fn feedback(&self) -> Option<&FeedbackHandle> {
        match self {
            Policy::Fixed(_) => None,
            Policy::Adaptive(adaptive) => Some(adaptive.feedback()),
        }
    }
}

impl From<FixedThreshold> for Policy {
    fn from(fixed: FixedThreshold) -> Self {
        Policy::Fixed(fixed)
    }
}

impl From<AdaptiveThreshold> for Policy {
    fn from(adaptive: AdaptiveThreshold) -> Self {
        Policy::Adaptive(adaptive)
    }
}

impl Replace for Policy {
    fn install(&self, line: &mut LineState, now: Tick) {
        match self {
            Policy::Fixed(fixed) => fixed.install(line, now),
            Policy::Adaptive(adaptive) => adaptive.install(line, now),
        }
    }

    fn touch(&self, line: &mut LineState, now: Tick) {
        match self {
            Policy::Fixed(fixed) => fixed.touch(line, now),
            Policy::Adaptive(adaptive) => adaptive.touch(line, now),
        }
    }

    fn invalidate(&self, line: &mut LineState) {
        match self {
            Policy::Fixed(fixed) => fixed.invalidate(line),
            Policy::Adaptive(adaptive) => adaptive.invalidate(line),
        }
    }

    fn select_victim<'a, I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a LineState>,
    {
        match self {
            Policy::Fixed(fixed) => fixed.select_victim(candidates),
            Policy::Adaptive(adaptive) => adaptive.select_victim(candidates),
        }
    }
}
