//! Wall-clock pacing for the frame loop.
//!
//! The limiter is polled: [`FrameLimiter::is_frame_ready`] either reports
//! that a frame is due, or waits a little (sleeping for long waits, spinning
//! for short ones) and reports that it is not. Time owed from late frames is
//! carried as debt, either modulo the frame period (frames may be skipped) or
//! in full (every frame runs, back to back if necessary).

use std::time::{Duration, Instant};

use log::trace;

/// Below this remaining wait the limiter spins instead of sleeping, since
/// OS sleeps routinely overshoot by a millisecond or two.
pub const SPIN_THRESHOLD: Duration = Duration::from_micros(2_300);

/// A frame that overran its slot by more than this is reported as late.
pub const LATE_THRESHOLD: Duration = Duration::from_micros(50);

pub const MIN_FRAMERATE: u32 = 1;
pub const MAX_FRAMERATE: u32 = 1_000;

/// Time source for the limiter.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);

    /// One iteration of a busy wait.
    fn spin(&self);
}

/// [`Clock`] backed by [`Instant`] and the OS scheduler.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn spin(&self) {
        std::hint::spin_loop();
        std::thread::yield_now();
    }
}

pub struct FrameLimiter<C: Clock = SystemClock> {
    clock: C,
    framerate: u32,
    period: Duration,
    debt: Duration,
    previous: Option<Duration>,
    allow_skip: bool,
    force_initial_frame: bool,
    frame_late: bool,
}

impl FrameLimiter<SystemClock> {
    pub fn new(framerate: u32, allow_skip: bool, force_initial_frame: bool) -> Self {
        Self::with_clock(SystemClock::new(), framerate, allow_skip, force_initial_frame)
    }
}

impl<C: Clock> FrameLimiter<C> {
    pub fn with_clock(clock: C, framerate: u32, allow_skip: bool, force_initial_frame: bool) -> Self {
        let mut limiter = Self {
            clock,
            framerate: 0,
            period: Duration::ZERO,
            debt: Duration::ZERO,
            previous: None,
            allow_skip,
            force_initial_frame,
            frame_late: false,
        };
        limiter.set_framerate(framerate);
        limiter
    }

    /// Clamps `framerate` to `1..=1000` frames per second.
    pub fn set_framerate(&mut self, framerate: u32) {
        self.framerate = framerate.clamp(MIN_FRAMERATE, MAX_FRAMERATE);
        self.period = Duration::from_nanos(1_000_000_000 / self.framerate as u64);
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn debt(&self) -> Duration {
        self.debt
    }

    pub fn allow_skip(&self) -> bool {
        self.allow_skip
    }

    pub fn set_allow_skip(&mut self, allow_skip: bool) {
        self.allow_skip = allow_skip;
    }

    /// True when the last due frame overran its slot by more than
    /// [`LATE_THRESHOLD`]. Only tracked while skipping is allowed.
    pub fn frame_late(&self) -> bool {
        self.frame_late
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Forgets accumulated debt and the previous timestamp.
    pub fn reset(&mut self) {
        self.debt = Duration::ZERO;
        self.previous = None;
        self.frame_late = false;
    }

    pub fn is_frame_ready(&mut self) -> bool {
        let now = self.clock.now();
        let Some(previous) = self.previous else {
            self.previous = Some(now);
            return self.force_initial_frame;
        };

        let total = now.saturating_sub(previous) + self.debt;
        if total >= self.period {
            self.previous = Some(now);
            let overrun = total - self.period;
            if self.allow_skip {
                let period_ns = self.period.as_nanos();
                self.debt = Duration::from_nanos((total.as_nanos() % period_ns) as u64);
                self.frame_late = overrun > LATE_THRESHOLD;
                if overrun >= self.period {
                    trace!(
                        "Dropping {} frame(s)",
                        overrun.as_nanos() / period_ns
                    );
                }
            } else {
                self.debt = overrun;
                self.frame_late = false;
            }
            return true;
        }

        let remaining = self.period - total;
        if remaining > SPIN_THRESHOLD {
            self.clock.sleep(remaining - SPIN_THRESHOLD);
        } else {
            self.clock.spin();
        }
        false
    }
}
