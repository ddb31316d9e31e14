use crate::{
    error::PolicyError,
    feedback::{FeedbackHandle, FeedbackParams},
};

use super::{scan_victim, LineState, Replace, Tick};

/// Reference-count admission whose threshold is tuned by miss-rate feedback.
///
/// Hits and installs count as accesses and every victim selection counts as a
/// miss. Policies cloned from each other, or built over the same
/// [`FeedbackHandle`], tune one shared threshold.
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    feedback: FeedbackHandle,
}

impl AdaptiveThreshold {
    /// A policy with its own private controller.
    pub fn new(params: FeedbackParams) -> Result<Self, PolicyError> {
        Ok(AdaptiveThreshold::with_feedback(FeedbackHandle::new(params)?))
    }

    pub fn with_feedback(feedback: FeedbackHandle) -> Self {
        AdaptiveThreshold { feedback }
    }

    pub fn feedback(&self) -> &FeedbackHandle {
        &self.feedback
    }
}

impl Replace for AdaptiveThreshold {
    fn install(&self, line: &mut LineState, _now: Tick) {
        line.install();
        let _ = self.feedback.lock().on_install();
    }

    fn touch(&self, line: &mut LineState, now: Tick) {
        let mut feedback = self.feedback.lock();
        line.admit(feedback.threshold(), now);
        feedback.record_access();
    }

    fn invalidate(&self, line: &mut LineState) {
        line.invalidate();
    }

    fn select_victim<'a, I>(&self, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a LineState>,
    {
        let victim = scan_victim(candidates);
        self.feedback.lock().record_miss();
        victim
    }
}
