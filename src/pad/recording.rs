//! Recording sink - captures every device call for assertions in tests

use super::{ButtonId, ControllerSink};
use parking_lot::Mutex;
use std::sync::Arc;

/// One call made against a [`ControllerSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    Press(ButtonId),
    Release(ButtonId),
    StickX(i16),
    StickY(i16),
    LeftTrigger(u8),
    RightTrigger(u8),
    Flush,
    Neutral,
}

/// Shared view of the calls a [`RecordingSink`] received
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl SinkLog {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &SinkCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Whether any axis or trigger setter was called
    pub fn has_axis_calls(&self) -> bool {
        self.calls.lock().iter().any(|c| {
            matches!(
                c,
                SinkCall::StickX(_)
                    | SinkCall::StickY(_)
                    | SinkCall::LeftTrigger(_)
                    | SinkCall::RightTrigger(_)
            )
        })
    }

    /// Most recent value staged for the left and right triggers
    pub fn last_triggers(&self) -> Option<(u8, u8)> {
        let calls = self.calls.lock();
        let left = calls.iter().rev().find_map(|c| match c {
            SinkCall::LeftTrigger(v) => Some(*v),
            _ => None,
        })?;
        let right = calls.iter().rev().find_map(|c| match c {
            SinkCall::RightTrigger(v) => Some(*v),
            _ => None,
        })?;
        Some((left, right))
    }

    fn push(&self, call: SinkCall) {
        self.calls.lock().push(call);
    }
}

/// Sink that records calls instead of driving a device
pub struct RecordingSink {
    log: SinkLog,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkLog) {
        let log = SinkLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl ControllerSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn press_button(&mut self, button: ButtonId) {
        self.log.push(SinkCall::Press(button));
    }

    fn release_button(&mut self, button: ButtonId) {
        self.log.push(SinkCall::Release(button));
    }

    fn set_left_stick_x(&mut self, value: i16) {
        self.log.push(SinkCall::StickX(value));
    }

    fn set_left_stick_y(&mut self, value: i16) {
        self.log.push(SinkCall::StickY(value));
    }

    fn set_left_trigger(&mut self, value: u8) {
        self.log.push(SinkCall::LeftTrigger(value));
    }

    fn set_right_trigger(&mut self, value: u8) {
        self.log.push(SinkCall::RightTrigger(value));
    }

    fn flush(&mut self) {
        self.log.push(SinkCall::Flush);
    }

    fn reset_to_neutral(&mut self) {
        self.log.push(SinkCall::Neutral);
    }
}
