//! Length state of an interval.
//!
//! A [`Span`] caches the interval's measured length, holds the ideal length
//! the elastic law pulls toward, records the last computed stress, and keeps a
//! FIFO chain of [`Future`] targets through which the ideal is animated.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Spans shorter than this exert no elastic force.
pub const MINIMUM_SPAN: f64 = 0.001;

/// Normalised stress never reaches 1 so it can be used as a bucket index.
const STRESS_CEILING: f64 = 1.0 - 1e-12;

// ---------------------------------------------------------------------------
// Future
// ---------------------------------------------------------------------------

/// One scheduled ideal-length target.
///
/// The clock of a future starts on the first tick it is experienced: at that
/// moment `initial` captures the current ideal and `when` becomes the age at
/// which `value` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Future {
    pub initial: f64,
    pub value: f64,
    pub how_long: u32,
    pub when: Option<u64>,
}

impl Future {
    fn new(value: f64, how_long: u32) -> Self {
        Self {
            initial: 0.0,
            value,
            how_long,
            when: None,
        }
    }

    fn current(&self, time_left: u64) -> f64 {
        let remaining = time_left as f64 / f64::from(self.how_long);
        self.initial * remaining + self.value * (1.0 - remaining)
    }
}

// ---------------------------------------------------------------------------
// StressRange
// ---------------------------------------------------------------------------

/// Bounds used to normalise a raw stress value into `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressRange {
    pub minimum: f64,
    pub maximum: f64,
}

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    actual: f64,
    ideal: f64,
    stress: f64,
    futures: VecDeque<Future>,
}

impl Span {
    /// A resting span whose ideal equals its measured length.
    pub fn new(length: f64) -> Self {
        Self::with_values(length, length, 0.0)
    }

    pub fn with_values(actual: f64, ideal: f64, stress: f64) -> Self {
        Self {
            actual,
            ideal,
            stress,
            futures: VecDeque::new(),
        }
    }

    pub fn actual(&self) -> f64 {
        self.actual
    }

    pub fn current_ideal(&self) -> f64 {
        self.ideal
    }

    pub fn stress(&self) -> f64 {
        self.stress
    }

    pub(crate) fn set_actual(&mut self, actual: f64) {
        self.actual = actual;
    }

    pub(crate) fn set_stress(&mut self, stress: f64) {
        self.stress = stress;
    }

    /// Stress mapped linearly onto `range`, clamped to `[0, 1)`.
    pub fn normalized_stress(&self, range: StressRange) -> f64 {
        let value = (self.stress - range.minimum) / (range.maximum - range.minimum);
        if value >= 1.0 {
            STRESS_CEILING
        } else if value < 0.0 || value.is_nan() {
            0.0
        } else {
            value
        }
    }

    /// Schedule a new ideal length.
    ///
    /// A duration of zero takes effect immediately and leaves any pending
    /// chain untouched; otherwise the target is appended to the chain.
    pub fn set_ideal(&mut self, value: f64, how_long: u32) {
        if how_long == 0 {
            self.ideal = value;
        } else {
            self.futures.push_back(Future::new(value, how_long));
        }
    }

    /// Schedule a tour through `factors × ultimate ideal` and back again,
    /// spending an equal share of `how_long` on each leg.
    pub fn perturb_ideal(&mut self, how_long: u32, factors: &[f64]) {
        let legs = u32::try_from(factors.len() + 1).unwrap_or(u32::MAX);
        let step = how_long / legs;
        let ultimate = self.ultimate_ideal();
        for factor in factors {
            self.set_ideal(ultimate * factor, step);
        }
        self.set_ideal(ultimate, step);
    }

    /// The ideal the span will settle on once its chain has run out.
    pub fn ultimate_ideal(&self) -> f64 {
        self.futures.back().map_or(self.ideal, |future| future.value)
    }

    /// Scale the ultimate ideal in place.
    pub fn adjust_ideal(&mut self, factor: f64) {
        match self.futures.back_mut() {
            Some(future) => future.value *= factor,
            None => self.ideal *= factor,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.futures.is_empty()
    }

    pub fn is_significant(&self) -> bool {
        self.actual > MINIMUM_SPAN
    }

    pub fn chain_size(&self) -> usize {
        self.futures.len()
    }

    pub fn futures(&self) -> impl Iterator<Item = &Future> {
        self.futures.iter()
    }

    pub(crate) fn push_future(&mut self, future: Future) {
        self.futures.push_back(future);
    }

    /// Advance the schedule to `age`. Returns whether a schedule is still
    /// running afterwards.
    ///
    /// A target scheduled over `how_long` ticks is reached exactly on the
    /// `how_long`-th tick experienced, and popped on that same tick.
    pub fn experience_time(&mut self, age: u64) -> bool {
        let ideal = self.ideal;
        if let Some(future) = self.futures.front_mut() {
            let when = match future.when {
                Some(when) => when,
                None => {
                    let when = age + u64::from(future.how_long.max(1)) - 1;
                    future.initial = ideal;
                    future.when = Some(when);
                    when
                }
            };
            if age >= when {
                self.ideal = future.value;
                self.futures.pop_front();
            } else {
                self.ideal = future.current(when - age);
            }
        }
        self.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(span: &mut Span, from: u64, ticks: u64) -> bool {
        let mut active = span.is_active();
        for age in from..from + ticks {
            active = span.experience_time(age);
        }
        active
    }

    #[test]
    fn immediate_ideal_skips_the_chain() {
        let mut span = Span::new(1.0);
        span.set_ideal(2.5, 0);
        assert_eq!(span.current_ideal(), 2.5);
        assert!(!span.is_active());
    }

    #[test]
    fn schedule_completes_after_exactly_how_long_ticks() {
        let mut span = Span::new(1.0);
        span.set_ideal(3.0, 10);
        assert!(run(&mut span, 1, 9));
        assert!(span.current_ideal() < 3.0);
        assert!(!run(&mut span, 10, 1));
        assert_eq!(span.current_ideal(), 3.0);
    }

    #[test]
    fn interpolation_is_linear() {
        let mut span = Span::new(0.0);
        span.set_ideal(4.0, 4);
        span.experience_time(100);
        assert!((span.current_ideal() - 1.0).abs() < 1e-12);
        span.experience_time(101);
        assert!((span.current_ideal() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn chained_futures_run_in_order() {
        let mut span = Span::new(1.0);
        span.set_ideal(2.0, 3);
        span.set_ideal(0.5, 2);
        assert_eq!(span.chain_size(), 2);
        assert_eq!(span.ultimate_ideal(), 0.5);
        run(&mut span, 1, 3);
        assert_eq!(span.current_ideal(), 2.0);
        assert_eq!(span.chain_size(), 1);
        let active = run(&mut span, 4, 2);
        assert!(!active);
        assert_eq!(span.current_ideal(), 0.5);
    }

    #[test]
    fn single_tick_future_lands_immediately() {
        let mut span = Span::new(1.0);
        span.set_ideal(7.0, 1);
        assert!(!span.experience_time(42));
        assert_eq!(span.current_ideal(), 7.0);
    }

    #[test]
    fn adjust_targets_the_ultimate_ideal() {
        let mut span = Span::new(2.0);
        span.adjust_ideal(1.5);
        assert_eq!(span.current_ideal(), 3.0);
        span.set_ideal(1.0, 5);
        span.set_ideal(4.0, 5);
        span.adjust_ideal(0.5);
        assert_eq!(span.ultimate_ideal(), 2.0);
        assert_eq!(span.current_ideal(), 3.0);
    }

    #[test]
    fn perturb_returns_to_the_ultimate_ideal() {
        let mut span = Span::new(2.0);
        span.perturb_ideal(30, &[1.5, 0.5]);
        let values: Vec<f64> = span.futures().map(|f| f.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
        assert!(span.futures().all(|f| f.how_long == 10));
    }

    #[test]
    fn normalized_stress_is_clamped() {
        let range = StressRange {
            minimum: -1.0,
            maximum: 1.0,
        };
        let mut span = Span::new(1.0);
        span.set_stress(0.0);
        assert!((span.normalized_stress(range) - 0.5).abs() < 1e-12);
        span.set_stress(5.0);
        assert!(span.normalized_stress(range) < 1.0);
        span.set_stress(-5.0);
        assert_eq!(span.normalized_stress(range), 0.0);
    }

    #[test]
    fn significance_threshold() {
        assert!(!Span::new(0.0005).is_significant());
        assert!(Span::new(0.002).is_significant());
    }
}
