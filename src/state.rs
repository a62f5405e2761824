//! Shared input state
//!
//! One [`InputState`] is shared between the input dispatcher (writes mouse
//! samples, resets the accumulators) and the update loop (drains deltas and
//! accumulates them). Mouse position, drain cursor and both accumulators
//! live behind a single `parking_lot::Mutex`, so a move event can never land
//! between the delta computation and the accumulation of a tick.
//!
//! The two hotkey flags are plain atomics: they are only ever overwritten,
//! never combined with other state.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::math::{clamp, scale_delta};

pub const STICK_MIN: i64 = i16::MIN as i64;
pub const STICK_MAX: i64 = i16::MAX as i64;
pub const TRIGGER_AXIS_MIN: i64 = -255;
pub const TRIGGER_AXIS_MAX: i64 = 255;

/// Last-known absolute pointer coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseSample {
    pub x: i64,
    pub y: i64,
}

/// Integrated mouse displacement since the last reset
///
/// `stick_x` stays within `[-32768, 32767]`, `trigger_axis` within `[-255, 255]`.
/// Positive `trigger_axis` drives the right trigger, negative the left one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatedAxis {
    pub stick_x: i64,
    pub trigger_axis: i64,
}

/// Per-axis scale factors applied to each drained delta
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensitivity {
    pub x: f64,
    pub trigger: f64,
}

#[derive(Debug, Default)]
struct Inner {
    /// Latest pointer position, `None` until the first move event
    position: Option<MouseSample>,
    /// Position at the previous drain
    cursor: Option<MouseSample>,
    axis: AccumulatedAxis,
}

impl Inner {
    fn drain(&mut self) -> (i64, i64) {
        match (self.position, self.cursor) {
            (Some(pos), Some(cur)) => {
                self.cursor = Some(pos);
                // Extreme coordinates saturate instead of overflowing
                (pos.x.saturating_sub(cur.x), pos.y.saturating_sub(cur.y))
            }
            _ => (0, 0),
        }
    }

    fn accumulate(&mut self, dx: i64, dy: i64, sensitivity: Sensitivity) -> AccumulatedAxis {
        let stick_x = self.axis.stick_x.saturating_add(scale_delta(dx, sensitivity.x));
        self.axis.stick_x = clamp(stick_x, STICK_MIN, STICK_MAX);

        // Pointer up (dy < 0) pushes the axis towards the right trigger
        let trigger = self
            .axis
            .trigger_axis
            .saturating_sub(scale_delta(dy, sensitivity.trigger));
        self.axis.trigger_axis = clamp(trigger, TRIGGER_AXIS_MIN, TRIGGER_AXIS_MAX);

        self.axis
    }
}

/// Mouse position and accumulators guarded by one lock
#[derive(Debug, Default)]
pub struct InputState {
    inner: Mutex<Inner>,
    hotkeys: HotkeyFlags,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored pointer position
    ///
    /// The very first sample also seeds the drain cursor, so no displacement
    /// is invented from an implicit origin.
    pub fn record_mouse_move(&self, x: i64, y: i64) {
        let mut inner = self.inner.lock();
        let sample = MouseSample { x, y };
        if inner.cursor.is_none() {
            inner.cursor = Some(sample);
        }
        inner.position = Some(sample);
    }

    /// Displacement since the previous drain; advances the cursor
    pub fn drain_delta(&self) -> (i64, i64) {
        self.inner.lock().drain()
    }

    /// Zero both accumulators
    pub fn reset_accumulators(&self) {
        self.inner.lock().axis = AccumulatedAxis::default();
        trace!("Accumulators reset");
    }

    /// Add a scaled delta to the accumulators and clamp them
    ///
    /// `stick_x += round(dx * x)`, `trigger_axis -= round(dy * trigger)`.
    pub fn accumulate_and_clamp(
        &self,
        dx: i64,
        dy: i64,
        sensitivity: Sensitivity,
    ) -> AccumulatedAxis {
        self.inner.lock().accumulate(dx, dy, sensitivity)
    }

    /// Drain and accumulate in one critical section (one tick's worth)
    pub fn advance(&self, sensitivity: Sensitivity) -> AccumulatedAxis {
        let mut inner = self.inner.lock();
        let (dx, dy) = inner.drain();
        if dx != 0 || dy != 0 {
            trace!(dx, dy, "Draining mouse delta");
        }
        inner.accumulate(dx, dy, sensitivity)
    }

    /// Current accumulator values
    pub fn axis(&self) -> AccumulatedAxis {
        self.inner.lock().axis
    }

    /// Latest pointer position, if any move has been seen
    pub fn mouse(&self) -> Option<MouseSample> {
        self.inner.lock().position
    }

    pub fn hotkeys(&self) -> &HotkeyFlags {
        &self.hotkeys
    }
}

/// Held state of the two full-trigger hotkeys
#[derive(Debug, Default)]
pub struct HotkeyFlags {
    full_left: AtomicBool,
    full_right: AtomicBool,
}

impl HotkeyFlags {
    pub fn set_full_left(&self, held: bool) {
        self.full_left.store(held, Ordering::Release);
    }

    pub fn set_full_right(&self, held: bool) {
        self.full_right.store(held, Ordering::Release);
    }

    pub fn full_left(&self) -> bool {
        self.full_left.load(Ordering::Acquire)
    }

    pub fn full_right(&self) -> bool {
        self.full_right.load(Ordering::Acquire)
    }
}
