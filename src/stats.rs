//! Latency statistics: exponentially-weighted moving averages, a sliding
//! median window, and atomic call counters shared across plugins/controller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Exponentially-weighted moving average over scalar samples.
#[derive(Debug, Clone, Copy)]
pub struct Ewma {
    alpha: f64,
    value: Option<f64>,
}

impl Ewma {
    pub fn new(alpha: f64) -> Self {
        assert!((0.0..=1.0).contains(&alpha));
        Self { alpha, value: None }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(v) => self.alpha * sample + (1.0 - self.alpha) * v,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn get(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Fixed-capacity sliding window reporting the median of its samples.
#[derive(Debug, Clone)]
pub struct SlidingWindowMedian {
    capacity: usize,
    window: VecDeque<f64>,
}

impl SlidingWindowMedian {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    pub fn median(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Atomic call counters for a single plugin or controller stage. Safe to
/// read/write concurrently with the transport task; values are read back as
/// an f64-valued snapshot map by `statistics()` implementations.
#[derive(Debug, Default)]
pub struct CallCounters {
    pub total_calls: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub failures_deadline: AtomicU64,
    pub failures_no_solution: AtomicU64,
    pub failures_invalid: AtomicU64,
}

impl CallCounters {
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, category: FailureCategory) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        match category {
            FailureCategory::Deadline => self.failures_deadline.fetch_add(1, Ordering::Relaxed),
            FailureCategory::NoSolution => self.failures_no_solution.fetch_add(1, Ordering::Relaxed),
            FailureCategory::Invalid => self.failures_invalid.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn reset(&self) {
        self.total_calls.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.failures_deadline.store(0, Ordering::Relaxed);
        self.failures_no_solution.store(0, Ordering::Relaxed);
        self.failures_invalid.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> std::collections::HashMap<String, f64> {
        let mut m = std::collections::HashMap::new();
        m.insert("total_calls".into(), self.total_calls.load(Ordering::Relaxed) as f64);
        m.insert("successes".into(), self.successes.load(Ordering::Relaxed) as f64);
        m.insert("failures".into(), self.failures.load(Ordering::Relaxed) as f64);
        m.insert(
            "failures_deadline".into(),
            self.failures_deadline.load(Ordering::Relaxed) as f64,
        );
        m.insert(
            "failures_no_solution".into(),
            self.failures_no_solution.load(Ordering::Relaxed) as f64,
        );
        m.insert(
            "failures_invalid".into(),
            self.failures_invalid.load(Ordering::Relaxed) as f64,
        );
        m
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Deadline,
    NoSolution,
    Invalid,
}
