//! Console sink - logs every committed controller report
//!
//! Useful for trying out a mapping without a virtual-controller driver
//! installed: each flush that changes the device state prints the report.

use super::{ButtonId, ControllerSink};
use tracing::{debug, info};

/// XUSB-style report: button bitmask plus the axes this crate drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub buttons: u16,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

impl Report {
    /// Names of the buttons held in this report
    pub fn held_buttons(&self) -> Vec<&'static str> {
        ButtonId::ALL
            .iter()
            .filter(|b| self.buttons & b.mask() != 0)
            .map(|b| b.name())
            .collect()
    }
}

/// ConsoleSink stages changes and logs the report on every effective flush
pub struct ConsoleSink {
    device: String,
    staged: Report,
    committed: Report,
    /// Flush counter for debugging
    flush_count: u64,
}

impl ConsoleSink {
    /// Create a console sink for a named virtual device
    pub fn new(device: impl Into<String>) -> Self {
        let device = device.into();
        info!("🔌 ConsoleSink '{}' created", device);
        Self {
            device,
            staged: Report::default(),
            committed: Report::default(),
            flush_count: 0,
        }
    }

    /// Last report committed to the (virtual) device
    pub fn committed(&self) -> Report {
        self.committed
    }
}

impl ControllerSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn press_button(&mut self, button: ButtonId) {
        self.staged.buttons |= button.mask();
    }

    fn release_button(&mut self, button: ButtonId) {
        self.staged.buttons &= !button.mask();
    }

    fn set_left_stick_x(&mut self, value: i16) {
        self.staged.thumb_lx = value;
    }

    fn set_left_stick_y(&mut self, value: i16) {
        self.staged.thumb_ly = value;
    }

    fn set_left_trigger(&mut self, value: u8) {
        self.staged.left_trigger = value;
    }

    fn set_right_trigger(&mut self, value: u8) {
        self.staged.right_trigger = value;
    }

    fn flush(&mut self) {
        self.flush_count += 1;
        if self.staged == self.committed {
            return;
        }
        self.committed = self.staged;

        let r = self.committed;
        info!(
            "🎮 [{}] {} → lx={:>6} ly={:>6} lt={:>3} rt={:>3} buttons=[{}] [flush #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.device,
            r.thumb_lx,
            r.thumb_ly,
            r.left_trigger,
            r.right_trigger,
            r.held_buttons().join(", "),
            self.flush_count
        );
        debug!(
            device = %self.device,
            buttons = r.buttons,
            flush_count = self.flush_count,
            "ConsoleSink report committed"
        );
    }

    fn reset_to_neutral(&mut self) {
        self.staged = Report::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_only_apply_on_flush() {
        let mut sink = ConsoleSink::new("test");
        sink.set_left_stick_x(1200);
        sink.press_button(ButtonId::A);
        assert_eq!(sink.committed(), Report::default());

        sink.flush();
        assert_eq!(sink.committed().thumb_lx, 1200);
        assert_eq!(sink.committed().held_buttons(), vec!["a"]);
    }

    #[test]
    fn test_release_clears_only_that_button() {
        let mut sink = ConsoleSink::new("test");
        sink.press_button(ButtonId::A);
        sink.press_button(ButtonId::LeftShoulder);
        sink.release_button(ButtonId::A);
        sink.flush();

        assert_eq!(sink.committed().buttons, ButtonId::LeftShoulder.mask());
    }

    #[test]
    fn test_neutral_clears_everything() {
        let mut sink = ConsoleSink::new("test");
        sink.press_button(ButtonId::Y);
        sink.set_left_trigger(255);
        sink.set_left_stick_x(-32768);
        sink.flush();

        sink.reset_to_neutral();
        sink.flush();
        assert_eq!(sink.committed(), Report::default());
    }
}
