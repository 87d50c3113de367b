/*
 *  pacer.rs
 *
 *  shmscope - eyes on the server
 *  (c) 2025 the shmscope authors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
use std::time::{Duration, Instant};

/// Default poll cadence, matching the server-side scope refresh.
pub const DEFAULT_INTERVAL_MS: u64 = 50;

/// Cooperative poll tick. The host loop asks `due()` once per pass; a
/// `true` answer consumes the deadline and schedules the next one, so two
/// ticks can never overlap. An interval of 0 fires on every pass.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    next_deadline: Instant,
    interval: Duration,
    running: bool,
}

impl PollScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            next_deadline: Instant::now(),
            interval: Duration::from_millis(interval_ms),
            running: false,
        }
    }

    #[inline]
    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    /// Negative intervals clamp to 0 ("as fast as the host loop allows").
    #[inline]
    pub fn set_interval_ms(&mut self, interval_ms: i64) {
        self.interval = Duration::from_millis(interval_ms.max(0) as u64);
    }

    /// Arm the scheduler; the first tick is due immediately.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.next_deadline = Instant::now();
        }
    }

    /// Idempotent; once stopped no further tick is due until `start`.
    pub fn stop(&mut self) {
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn due(&mut self) -> bool {
        self.due_at(Instant::now())
    }

    pub fn due_at(&mut self, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        if now >= self.next_deadline {
            self.next_deadline = now + self.interval;
            true
        } else {
            false
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_until_started() {
        let mut s = PollScheduler::default();
        assert!(!s.due_at(Instant::now()));
        s.start();
        assert!(s.due_at(Instant::now()));
    }

    #[test]
    fn deadline_spacing() {
        let mut s = PollScheduler::new(50);
        s.start();
        let t0 = Instant::now();
        assert!(s.due_at(t0));
        // within the interval: quiet
        assert!(!s.due_at(t0 + Duration::from_millis(10)));
        assert!(!s.due_at(t0 + Duration::from_millis(49)));
        // past the deadline: exactly one tick fires
        assert!(s.due_at(t0 + Duration::from_millis(50)));
        assert!(!s.due_at(t0 + Duration::from_millis(51)));
    }

    #[test]
    fn zero_interval_fires_every_pass() {
        let mut s = PollScheduler::new(0);
        s.start();
        let t0 = Instant::now();
        assert!(s.due_at(t0));
        assert!(s.due_at(t0));
        assert!(s.due_at(t0 + Duration::from_millis(1)));
    }

    #[test]
    fn negative_interval_clamps_to_zero() {
        let mut s = PollScheduler::new(50);
        s.set_interval_ms(-20);
        assert_eq!(s.interval_ms(), 0);
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let mut s = PollScheduler::new(0);
        s.start();
        assert!(s.due_at(Instant::now()));

        s.stop();
        let first = s.clone();
        s.stop();
        // double stop leaves identical state
        assert_eq!(s.is_running(), first.is_running());
        assert_eq!(s.interval_ms(), first.interval_ms());
        // and no tick ever fires again
        assert!(!s.due_at(Instant::now() + Duration::from_secs(60)));
    }
}
