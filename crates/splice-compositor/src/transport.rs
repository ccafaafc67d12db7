//! Playback transport.
//!
//! The transport owns the playhead. It never sleeps or spawns anything: the
//! caller drives it with `tick(now)` from whatever clock it has (a frame
//! timer, a thread, a test).

use splice_core::RationalTime;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlayState {
    Paused,
    /// Playing since `since`, when the playhead was at `anchor`.
    Playing { anchor: RationalTime, since: Instant },
}

/// Result of advancing the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not playing; the playhead did not move.
    Idle(RationalTime),
    /// Playing; the playhead is now here.
    Advanced(RationalTime),
    /// Reached the end: playback stopped and the playhead rewound to zero.
    Ended,
}

#[derive(Debug, Clone)]
pub struct Transport {
    position: RationalTime,
    duration: RationalTime,
    speed: f64,
    state: PlayState,
}

impl Transport {
    pub fn new(duration: RationalTime) -> Self {
        Self {
            position: RationalTime::ZERO,
            duration: duration.non_negative(),
            speed: 1.0,
            state: PlayState::Paused,
        }
    }

    pub fn position(&self) -> RationalTime {
        self.position
    }

    pub fn duration(&self) -> RationalTime {
        self.duration
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing { .. })
    }

    /// Update the timeline length after an edit. The playhead is clamped.
    pub fn set_duration(&mut self, duration: RationalTime, now: Instant) {
        self.duration = duration.non_negative();
        if self.position > self.duration {
            self.seek(self.duration, now);
        }
    }

    /// Change the playback rate. Non-finite or non-positive rates are ignored.
    pub fn set_speed(&mut self, speed: f64, now: Instant) {
        if !speed.is_finite() || speed <= 0.0 {
            return;
        }
        self.reanchor(now);
        self.speed = speed;
    }

    pub fn play(&mut self, now: Instant) {
        if !self.is_playing() {
            self.state = PlayState::Playing {
                anchor: self.position,
                since: now,
            };
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.is_playing() {
            self.position = self.playhead_at(now).min(self.duration);
            self.state = PlayState::Paused;
        }
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.is_playing() {
            self.pause(now);
        } else {
            self.play(now);
        }
    }

    /// Jump to `time` (clamped to the timeline). Playback continues from
    /// there if it was running.
    pub fn seek(&mut self, time: RationalTime, now: Instant) {
        self.position = time.non_negative().min(self.duration);
        if self.is_playing() {
            self.state = PlayState::Playing {
                anchor: self.position,
                since: now,
            };
        }
    }

    /// Seek relative to the current playhead.
    pub fn skip(&mut self, delta: RationalTime, now: Instant) {
        let current = self.playhead_at(now);
        self.seek(current + delta, now);
    }

    /// Stop and rewind to the start.
    pub fn restart(&mut self) {
        self.position = RationalTime::ZERO;
        self.state = PlayState::Paused;
    }

    /// Advance the playhead to wall-clock `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        if !self.is_playing() {
            return Tick::Idle(self.position);
        }
        let t = self.playhead_at(now);
        if t >= self.duration {
            tracing::trace!(duration = %self.duration, "playback reached end");
            self.restart();
            Tick::Ended
        } else {
            self.position = t;
            Tick::Advanced(t)
        }
    }

    fn playhead_at(&self, now: Instant) -> RationalTime {
        match self.state {
            PlayState::Paused => self.position,
            PlayState::Playing { anchor, since } => {
                let elapsed = now.saturating_duration_since(since).as_secs_f64();
                anchor + RationalTime::from_seconds_f64(elapsed * self.speed)
            }
        }
    }

    fn reanchor(&mut self, now: Instant) {
        if self.is_playing() {
            self.position = self.playhead_at(now).min(self.duration);
            self.state = PlayState::Playing {
                anchor: self.position,
                since: now,
            };
        }
    }
}
