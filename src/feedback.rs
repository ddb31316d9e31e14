//! Miss-rate feedback for the adaptive admission threshold.
//!
//! The controller counts accesses and misses over fixed windows. The first
//! window is a warm-up that is thrown away; after it, each window's miss rate
//! is compared against the previous one and the threshold climbs by `step` when
//! the rate improved and falls by `step` otherwise, clamped to
//! `[min_threshold, max_threshold]`.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

pub const DEFAULT_WINDOW: u64 = 10_000_000;
pub const DEFAULT_STEP: u32 = 4;
pub const DEFAULT_MIN_THRESHOLD: u32 = 1;
pub const DEFAULT_MAX_THRESHOLD: u32 = 22;
pub const DEFAULT_WARMUP_MISS_RATE: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackParams {
    /// Accesses per measurement window.
    pub window: u64,
    pub step: u32,
    pub min_threshold: u32,
    pub max_threshold: u32,
    /// Miss rate assumed for the window before the first measured one.
    pub warmup_miss_rate: f64,
}

impl FeedbackParams {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.window == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if self.step == 0 {
            return Err(PolicyError::ZeroStep);
        }
        if self.min_threshold == 0 || self.min_threshold > self.max_threshold {
            return Err(PolicyError::InvalidBounds {
                min: self.min_threshold,
                max: self.max_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.warmup_miss_rate) {
            return Err(PolicyError::InvalidMissRate(self.warmup_miss_rate));
        }
        Ok(())
    }
}

impl Default for FeedbackParams {
    fn default() -> Self {
        FeedbackParams {
            window: DEFAULT_WINDOW,
            step: DEFAULT_STEP,
            min_threshold: DEFAULT_MIN_THRESHOLD,
            max_threshold: DEFAULT_MAX_THRESHOLD,
            warmup_miss_rate: DEFAULT_WARMUP_MISS_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Raised,
    Lowered,
}

/// What happened at a window boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowOutcome {
    /// Warm-up finished and the counters were reset to the baseline.
    ColdStart,
    Adjusted {
        miss_rate: f64,
        previous_miss_rate: f64,
        direction: Direction,
        threshold: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeedbackSnapshot {
    pub accesses: u64,
    pub misses: u64,
    pub threshold: u32,
    pub last_miss_rate: f64,
    pub warmed_up: bool,
}

#[derive(Debug)]
pub struct FeedbackController {
    params: FeedbackParams,
    accesses: u64,
    misses: u64,
    threshold: u32,
    last_miss_rate: f64,
    warmed_up: bool,
}

impl FeedbackController {
    pub fn new(params: FeedbackParams) -> Result<Self, PolicyError> {
        params.validate()?;
        Ok(FeedbackController {
            params,
            accesses: 0,
            misses: 0,
            threshold: params.min_threshold,
            last_miss_rate: 0.0,
            warmed_up: false,
        })
    }

    pub fn params(&self) -> &FeedbackParams {
        &self.params
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_access(&mut self) {
        self.accesses += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Window bookkeeping run once per line install.
    ///
    /// The install counts as an access unless it is the one that ends warm-up.
    pub fn on_install(&mut self) -> Option<WindowOutcome> {
        let mut outcome = None;
        if !self.warmed_up && self.accesses > self.params.window {
            self.cold_start();
            outcome = Some(WindowOutcome::ColdStart);
        } else {
            self.accesses += 1;
        }

        if self.warmed_up && self.accesses > self.params.window {
            outcome = Some(self.roll_window());
        }
        outcome
    }

    pub fn snapshot(&self) -> FeedbackSnapshot {
        FeedbackSnapshot {
            accesses: self.accesses,
            misses: self.misses,
            threshold: self.threshold,
            last_miss_rate: self.last_miss_rate,
            warmed_up: self.warmed_up,
        }
    }

    fn cold_start(&mut self) {
        // Starting at 1 keeps the next window from closing immediately.
        self.accesses = 1;
        self.misses = 0;
        self.threshold = self.params.min_threshold;
        self.last_miss_rate = self.params.warmup_miss_rate;
        self.warmed_up = true;
        log::info!(
            "feedback warm-up finished, threshold reset to {}",
            self.threshold
        );
    }

    fn roll_window(&mut self) -> WindowOutcome {
        let miss_rate = miss_rate(self.misses, self.accesses);
        let previous_miss_rate = self.last_miss_rate;
        log::info!(
            "feedback window closed: {} accesses, {} misses",
            self.accesses,
            self.misses
        );
        log::info!(
            "miss rate {:.2} / 10000, previous {:.2} / 10000",
            miss_rate * 10000.0,
            previous_miss_rate * 10000.0
        );

        let direction = if miss_rate < previous_miss_rate {
            self.threshold = self
                .threshold
                .saturating_add(self.params.step)
                .min(self.params.max_threshold);
            Direction::Raised
        } else {
            self.threshold = self
                .threshold
                .saturating_sub(self.params.step)
                .max(self.params.min_threshold);
            Direction::Lowered
        };
        log::info!("threshold {:?} to {}", direction, self.threshold);

        self.last_miss_rate = miss_rate;
        self.accesses = 0;
        self.misses = 0;

        WindowOutcome::Adjusted {
            miss_rate,
            previous_miss_rate,
            direction,
            threshold: self.threshold,
        }
    }
}

fn miss_rate(misses: u64, accesses: u64) -> f64 {
    assert_ne!(accesses, 0, "miss rate over an empty window");
    misses as f64 / accesses as f64
}

/// Shared ownership of one controller.
///
/// Every policy holding a clone of the same handle tunes the same threshold.
#[derive(Debug, Clone)]
pub struct FeedbackHandle {
    inner: Arc<Mutex<FeedbackController>>,
}

impl FeedbackHandle {
    pub fn new(params: FeedbackParams) -> Result<Self, PolicyError> {
        Ok(FeedbackHandle {
            inner: Arc::new(Mutex::new(FeedbackController::new(params)?)),
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, FeedbackController> {
        self.inner.lock()
    }

    pub fn threshold(&self) -> u32 {
        self.lock().threshold()
    }

    pub fn params(&self) -> FeedbackParams {
        *self.lock().params()
    }

    pub fn snapshot(&self) -> FeedbackSnapshot {
        self.lock().snapshot()
    }

    /// True when both handles drive the same controller.
    pub fn ptr_eq(&self, other: &FeedbackHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(window: u64) -> FeedbackController {
        FeedbackController::new(FeedbackParams {
            window,
            ..FeedbackParams::default()
        })
        .unwrap()
    }

    fn finish_warmup(fb: &mut FeedbackController) {
        while fb.accesses <= fb.params.window {
            fb.record_access();
        }
        assert_eq!(fb.on_install(), Some(WindowOutcome::ColdStart));
    }

    #[test]
    fn starts_cold() {
        let snap = small(10).snapshot();
        assert_eq!(snap.accesses, 0);
        assert_eq!(snap.misses, 0);
        assert_eq!(snap.threshold, 1);
        assert!(!snap.warmed_up);
    }

    #[test]
    fn warmup_ignores_misses() {
        let mut fb = small(10);
        for _ in 0..5 {
            fb.record_access();
            fb.record_miss();
            assert_eq!(fb.on_install(), None);
        }
        assert_eq!(fb.snapshot().accesses, 10);
        assert_eq!(fb.threshold(), 1);

        fb.record_access();
        assert_eq!(fb.on_install(), Some(WindowOutcome::ColdStart));
        let snap = fb.snapshot();
        assert_eq!(snap.accesses, 1);
        assert_eq!(snap.misses, 0);
        assert_eq!(snap.threshold, 1);
        assert_eq!(snap.last_miss_rate, 0.99);
        assert!(snap.warmed_up);
    }

    #[test]
    fn better_window_raises_threshold() {
        let mut fb = small(10);
        finish_warmup(&mut fb);
        for _ in 0..9 {
            fb.record_access();
        }
        fb.record_miss();
        // accesses: 1 + 9 + 1 (install) = 11 > 10
        match fb.on_install() {
            Some(WindowOutcome::Adjusted {
                miss_rate,
                previous_miss_rate,
                direction,
                threshold,
            }) => {
                assert_eq!(miss_rate, 1.0 / 11.0);
                assert_eq!(previous_miss_rate, 0.99);
                assert_eq!(direction, Direction::Raised);
                assert_eq!(threshold, 5);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let snap = fb.snapshot();
        assert_eq!(snap.accesses, 0);
        assert_eq!(snap.misses, 0);
    }

    #[test]
    fn equal_rate_lowers_threshold() {
        let mut fb = small(3);
        fb.threshold = 9;
        fb.warmed_up = true;
        fb.last_miss_rate = 0.5;
        fb.accesses = 3;
        fb.misses = 2;
        // 2 / 4 == previous rate
        let outcome = fb.on_install();
        assert!(matches!(
            outcome,
            Some(WindowOutcome::Adjusted {
                direction: Direction::Lowered,
                threshold: 5,
                ..
            })
        ));
    }

    #[test]
    fn threshold_stays_within_bounds() {
        let mut fb = small(1);
        fb.warmed_up = true;
        let mut seen = Vec::new();
        // Every window sees zero misses; the forced previous rate decides
        // whether it counts as better or worse.
        for round in 0..40u32 {
            fb.last_miss_rate = if round < 20 { 1.0 } else { 0.0 };
            fb.accesses = 1;
            fb.on_install();
            let t = fb.threshold();
            assert!((1..=22).contains(&t), "threshold {t} out of bounds");
            seen.push(t);
        }
        assert_eq!(&seen[..7], &[5, 9, 13, 17, 21, 22, 22]);
        assert_eq!(&seen[20..27], &[18, 14, 10, 6, 2, 1, 1]);
    }

    #[test]
    fn rejects_bad_params() {
        let bad = [
            FeedbackParams {
                window: 0,
                ..FeedbackParams::default()
            },
            FeedbackParams {
                step: 0,
                ..FeedbackParams::default()
            },
            FeedbackParams {
                min_threshold: 0,
                ..FeedbackParams::default()
            },
            FeedbackParams {
                min_threshold: 30,
                ..FeedbackParams::default()
            },
            FeedbackParams {
                warmup_miss_rate: 1.5,
                ..FeedbackParams::default()
            },
        ];
        for params in bad {
            assert!(FeedbackController::new(params).is_err(), "{params:?}");
        }
    }

    #[test]
    fn snapshot_serializes_counters() {
        let mut fb = small(10);
        fb.record_access();
        fb.record_miss();
        let json = serde_json::to_value(fb.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "accesses": 1,
                "misses": 1,
                "threshold": 1,
                "last_miss_rate": 0.0,
                "warmed_up": false,
            })
        );
    }

    #[test]
    fn clones_share_state() {
        let a = FeedbackHandle::new(FeedbackParams::default()).unwrap();
        let b = a.clone();
        let c = FeedbackHandle::new(FeedbackParams::default()).unwrap();
        a.lock().record_miss();
        assert_eq!(b.snapshot().misses, 1);
        assert_eq!(c.snapshot().misses, 0);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
