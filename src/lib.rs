//! Mouse2Pad core
//!
//! Turns pointer movement and keyboard keys into a virtual Xbox 360 style
//! controller: horizontal motion drives the left stick X axis, vertical
//! motion drives the triggers, mapped keys press buttons.
//!
//! Data flow:
//!
//! ```text
//! input source ──► InputEvent channel ──► InputDispatcher ──► InputState
//!                                              │                  │
//!                                              ▼                  ▼
//!                                         PadOutput ◄──────── UpdateLoop
//! ```

pub mod config;
pub mod engine;
pub mod input;
pub mod keys;
pub mod math;
pub mod pad;
pub mod paths;
pub mod state;
