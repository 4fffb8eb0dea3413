// ABOUTME: Output-volume heuristics: the sliding "is working" window and initial-prompt readiness

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bytes seen over the last `window`; active while they exceed `threshold`
#[derive(Debug, Clone)]
pub struct ActivityWindow {
    window: Duration,
    threshold: usize,
    samples: VecDeque<(Instant, usize)>,
    total: usize,
}

impl ActivityWindow {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold,
            samples: VecDeque::new(),
            total: 0,
        }
    }

    pub fn record(&mut self, now: Instant, bytes: usize) {
        self.expire(now);
        self.samples.push_back((now, bytes));
        self.total += bytes;
    }

    pub fn is_active(&mut self, now: Instant) -> bool {
        self.expire(now);
        self.total > self.threshold
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&(at, bytes)) = self.samples.front() {
            if now.saturating_duration_since(at) <= self.window {
                break;
            }
            self.samples.pop_front();
            self.total -= bytes;
        }
    }
}

/// Withholds an initial prompt until the tool has printed enough to be taking input
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    prompt: Option<String>,
    threshold: usize,
    seen: usize,
    opened: bool,
}

impl ReadinessGate {
    pub fn new(prompt: Option<String>, threshold: usize) -> Self {
        Self {
            prompt: prompt.filter(|p| !p.trim().is_empty()),
            threshold,
            seen: 0,
            opened: false,
        }
    }

    /// True exactly once: on the output that pushes the total past the threshold
    pub fn observe(&mut self, bytes: usize) -> bool {
        if self.opened || self.prompt.is_none() {
            return false;
        }
        self.seen += bytes;
        if self.seen > self.threshold {
            self.opened = true;
            return true;
        }
        false
    }

    pub fn take_prompt(&mut self) -> Option<String> {
        if self.opened {
            self.prompt.take()
        } else {
            None
        }
    }
}
