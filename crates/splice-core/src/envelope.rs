//! Linear fade envelope.
//!
//! One law drives video opacity, audio gain and text-overlay alpha, both in
//! the live preview and in the compiled export graph.

use serde::{Deserialize, Serialize};

use crate::interval::clamp_unit;

/// Fade-in / fade-out lengths in seconds, evaluated over a clip's local time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FadeEnvelope {
    pub fade_in: f64,
    pub fade_out: f64,
}

impl FadeEnvelope {
    /// Build an envelope; negative or non-finite lengths count as no fade.
    pub fn new(fade_in: f64, fade_out: f64) -> Self {
        Self {
            fade_in: sanitize(fade_in),
            fade_out: sanitize(fade_out),
        }
    }

    /// True when neither ramp applies.
    pub fn is_flat(self) -> bool {
        self.fade_in <= 0.0 && self.fade_out <= 0.0
    }

    /// Envelope value at `local` seconds into a clip of `duration` seconds.
    ///
    /// The in-ramp rises over `fade_in` from the clip start, the out-ramp
    /// falls over `fade_out` before the clip end, and where both apply the
    /// lower one wins. The result is always in [0, 1], even when the fades
    /// overlap because `fade_in + fade_out > duration`.
    pub fn value_at(self, local: f64, duration: f64) -> f64 {
        let mut value: f64 = 1.0;
        if self.fade_in > 0.0 && local < self.fade_in {
            value = local / self.fade_in;
        }
        if self.fade_out > 0.0 && local > duration - self.fade_out {
            value = value.min((duration - local) / self.fade_out);
        }
        clamp_unit(value)
    }

    /// Fade lengths clamped into a clip of `duration` seconds.
    pub fn clamped_to(self, duration: f64) -> Self {
        let duration = sanitize(duration);
        Self {
            fade_in: self.fade_in.min(duration),
            fade_out: self.fade_out.min(duration),
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
