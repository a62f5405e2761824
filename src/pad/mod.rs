//! Virtual controller output
//!
//! The virtual device itself lives outside this crate. Everything that talks
//! to it goes through the [`ControllerSink`] trait, and every caller inside
//! the crate goes through one shared [`PadOutput`], which serializes access
//! between the key handler (button edges) and the update loop (axis frames).

pub mod console;
#[cfg(test)]
pub mod recording;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use console::ConsoleSink;

/// Prefixes used by the legacy script for button names
const LEGACY_BUTTON_PREFIXES: [&str; 2] = ["vg.XUSB_BUTTON.", "XUSB_GAMEPAD_"];

/// Errors raised while bringing up or talking to the virtual device
#[derive(Debug, Error)]
pub enum PadError {
    /// The virtual controller could not be created (driver missing or misconfigured)
    #[error("failed to create virtual controller: {0}")]
    DeviceInit(String),

    /// The configured output backend does not exist in this build
    #[error("unknown output backend '{0}' (available: console, null)")]
    UnknownBackend(String),
}

/// Digital buttons of an Xbox 360 style controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ButtonId {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    Guide,
    A,
    B,
    X,
    Y,
}

impl ButtonId {
    /// All buttons, in report bit order
    pub const ALL: [ButtonId; 15] = [
        ButtonId::DpadUp,
        ButtonId::DpadDown,
        ButtonId::DpadLeft,
        ButtonId::DpadRight,
        ButtonId::Start,
        ButtonId::Back,
        ButtonId::LeftThumb,
        ButtonId::RightThumb,
        ButtonId::LeftShoulder,
        ButtonId::RightShoulder,
        ButtonId::Guide,
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
    ];

    /// XUSB report bit for this button
    pub fn mask(self) -> u16 {
        match self {
            ButtonId::DpadUp => 0x0001,
            ButtonId::DpadDown => 0x0002,
            ButtonId::DpadLeft => 0x0004,
            ButtonId::DpadRight => 0x0008,
            ButtonId::Start => 0x0010,
            ButtonId::Back => 0x0020,
            ButtonId::LeftThumb => 0x0040,
            ButtonId::RightThumb => 0x0080,
            ButtonId::LeftShoulder => 0x0100,
            ButtonId::RightShoulder => 0x0200,
            ButtonId::Guide => 0x0400,
            ButtonId::A => 0x1000,
            ButtonId::B => 0x2000,
            ButtonId::X => 0x4000,
            ButtonId::Y => 0x8000,
        }
    }

    /// Canonical snake_case name (used in config files and logs)
    pub fn name(self) -> &'static str {
        match self {
            ButtonId::DpadUp => "dpad_up",
            ButtonId::DpadDown => "dpad_down",
            ButtonId::DpadLeft => "dpad_left",
            ButtonId::DpadRight => "dpad_right",
            ButtonId::Start => "start",
            ButtonId::Back => "back",
            ButtonId::LeftThumb => "left_thumb",
            ButtonId::RightThumb => "right_thumb",
            ButtonId::LeftShoulder => "left_shoulder",
            ButtonId::RightShoulder => "right_shoulder",
            ButtonId::Guide => "guide",
            ButtonId::A => "a",
            ButtonId::B => "b",
            ButtonId::X => "x",
            ButtonId::Y => "y",
        }
    }
}

/// A button spelling that matches no [`ButtonId`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown gamepad button: '{0}'")]
pub struct UnknownButton(pub String);

impl FromStr for ButtonId {
    type Err = UnknownButton;

    /// Accepts `a`, `A`, `dpad_up`, `lb`, `XUSB_GAMEPAD_A` and `vg.XUSB_BUTTON.XUSB_GAMEPAD_A`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut name = s.trim();
        for prefix in LEGACY_BUTTON_PREFIXES {
            name = name.strip_prefix(prefix).unwrap_or(name);
        }
        let name = name.to_ascii_lowercase().replace('-', "_");

        let button = match name.as_str() {
            "dpad_up" | "up" => ButtonId::DpadUp,
            "dpad_down" | "down" => ButtonId::DpadDown,
            "dpad_left" | "left" => ButtonId::DpadLeft,
            "dpad_right" | "right" => ButtonId::DpadRight,
            "start" => ButtonId::Start,
            "back" | "select" => ButtonId::Back,
            "left_thumb" | "ls" | "l3" => ButtonId::LeftThumb,
            "right_thumb" | "rs" | "r3" => ButtonId::RightThumb,
            "left_shoulder" | "lb" => ButtonId::LeftShoulder,
            "right_shoulder" | "rb" => ButtonId::RightShoulder,
            "guide" | "home" => ButtonId::Guide,
            "a" => ButtonId::A,
            "b" => ButtonId::B,
            "x" => ButtonId::X,
            "y" => ButtonId::Y,
            _ => return Err(UnknownButton(s.to_string())),
        };
        Ok(button)
    }
}

impl TryFrom<String> for ButtonId {
    type Error = UnknownButton;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ButtonId> for String {
    fn from(button: ButtonId) -> Self {
        button.name().to_string()
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability set of the virtual controller device
///
/// Setters only stage values; nothing reaches the device until [`flush`](Self::flush).
pub trait ControllerSink: Send {
    /// Backend name for logs (e.g. "console")
    fn name(&self) -> &str;

    fn press_button(&mut self, button: ButtonId);

    fn release_button(&mut self, button: ButtonId);

    fn set_left_stick_x(&mut self, value: i16);

    fn set_left_stick_y(&mut self, value: i16);

    fn set_left_trigger(&mut self, value: u8);

    fn set_right_trigger(&mut self, value: u8);

    /// Commit every staged change to the device
    fn flush(&mut self);

    /// Stage the neutral state: all axes 0, all buttons released
    fn reset_to_neutral(&mut self);
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl ControllerSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }
    fn press_button(&mut self, _button: ButtonId) {}
    fn release_button(&mut self, _button: ButtonId) {}
    fn set_left_stick_x(&mut self, _value: i16) {}
    fn set_left_stick_y(&mut self, _value: i16) {}
    fn set_left_trigger(&mut self, _value: u8) {}
    fn set_right_trigger(&mut self, _value: u8) {}
    fn flush(&mut self) {}
    fn reset_to_neutral(&mut self) {}
}

/// Create the sink for a backend name
///
/// Failure here is fatal for the process: a missing driver is not transient.
pub fn connect(backend: &str) -> Result<Box<dyn ControllerSink>, PadError> {
    match backend.trim().to_ascii_lowercase().as_str() {
        "console" => Ok(Box::new(ConsoleSink::new("virtual-x360"))),
        "null" | "none" => Ok(Box::new(NullSink)),
        "" => Err(PadError::DeviceInit("no output backend configured".to_string())),
        other => Err(PadError::UnknownBackend(other.to_string())),
    }
}

/// One axis snapshot pushed to the device per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    pub stick_x: i16,
    pub stick_y: i16,
    pub left_trigger: u8,
    pub right_trigger: u8,
}

/// Shared handle to the virtual controller
///
/// All sink calls happen under one lock, so a button edge can never land in
/// the middle of an axis frame. Once [`release`](Self::release) has run, the
/// device is neutral and every further call is ignored. Dropping the last
/// handle releases the device too, which covers early returns and unwinding.
pub struct PadOutput {
    sink: Mutex<Box<dyn ControllerSink>>,
    released: AtomicBool,
}

impl PadOutput {
    pub fn new(sink: Box<dyn ControllerSink>) -> Self {
        info!("🎮 Virtual controller attached (backend: {})", sink.name());
        Self {
            sink: Mutex::new(sink),
            released: AtomicBool::new(false),
        }
    }

    /// Whether the device has already been reset and released
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Press a button and commit it immediately
    pub fn press(&self, button: ButtonId) {
        let mut sink = self.sink.lock();
        if self.is_released() {
            debug!("Ignoring press of {} after release", button);
            return;
        }
        sink.press_button(button);
        sink.flush();
    }

    /// Release a button and commit it immediately
    pub fn release_button(&self, button: ButtonId) {
        let mut sink = self.sink.lock();
        if self.is_released() {
            debug!("Ignoring release of {} after device release", button);
            return;
        }
        sink.release_button(button);
        sink.flush();
    }

    /// Stage and commit one axis frame
    pub fn submit(&self, frame: Frame) {
        let mut sink = self.sink.lock();
        if self.is_released() {
            return;
        }
        sink.set_left_stick_x(frame.stick_x);
        sink.set_left_stick_y(frame.stick_y);
        sink.set_left_trigger(frame.left_trigger);
        sink.set_right_trigger(frame.right_trigger);
        sink.flush();
    }

    /// Reset the device to neutral and flush, exactly once
    ///
    /// Returns `true` if this call performed the reset.
    pub fn release(&self) -> bool {
        let mut sink = self.sink.lock();
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        sink.reset_to_neutral();
        sink.flush();
        info!("🎮 Virtual controller reset to neutral ({})", sink.name());
        true
    }
}

impl Drop for PadOutput {
    fn drop(&mut self) {
        if !self.is_released() {
            warn!("Virtual controller dropped without explicit release, resetting");
            self.release();
        }
    }
}
