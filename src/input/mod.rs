//! Input events and key handling
//!
//! Input sources (the OS listeners live outside this crate; the bundled
//! [`repl`] source reads events from a terminal) push [`InputEvent`]s into an
//! unbounded channel. A single dispatcher task drains the channel
//! sequentially: mouse moves update the shared [`InputState`], key edges go
//! through the [`KeyHandler`] state machine.

pub mod repl;

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::AppConfig;
use crate::keys::KeyId;
use crate::pad::{ButtonId, PadOutput};
use crate::state::InputState;

/// Event delivered by an input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Absolute pointer position
    MouseMove { x: i64, y: i64 },
    KeyPress(KeyId),
    KeyRelease(KeyId),
}

/// Sending half handed to input sources
pub type EventSender = mpsc::UnboundedSender<InputEvent>;
/// Receiving half consumed by the dispatcher
pub type EventReceiver = mpsc::UnboundedReceiver<InputEvent>;

/// Create the channel between input sources and the dispatcher
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Side effect chosen for one key edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Accumulators were zeroed
    Reset,
    /// Full-left-trigger hotkey flag set (`true`) or cleared (`false`)
    FullLeftTrigger(bool),
    /// Full-right-trigger hotkey flag set (`true`) or cleared (`false`)
    FullRightTrigger(bool),
    /// Mapped button pressed or released on the device
    Button { button: ButtonId, pressed: bool },
    /// Key has no binding (or no release behavior)
    Ignored,
}

/// Turns key edges into hotkey flags, resets and button calls
///
/// Priority on press: reset key, full-left hotkey, full-right hotkey, mapping
/// table. Releases mirror that order; the reset key has no release behavior.
/// Repeated presses simply re-apply the same idempotent action.
pub struct KeyHandler {
    config: Arc<AppConfig>,
    state: Arc<InputState>,
    pad: Arc<PadOutput>,
}

impl KeyHandler {
    pub fn new(config: Arc<AppConfig>, state: Arc<InputState>, pad: Arc<PadOutput>) -> Self {
        Self { config, state, pad }
    }

    pub fn on_press(&self, key: &KeyId) -> KeyAction {
        if *key == self.config.reset_key {
            self.state.reset_accumulators();
            info!("--- Input reset ({}) ---", key);
            return KeyAction::Reset;
        }
        if self.config.full_left_trigger_key.as_ref() == Some(key) {
            self.state.hotkeys().set_full_left(true);
            debug!("Full left trigger held ({})", key);
            return KeyAction::FullLeftTrigger(true);
        }
        if self.config.full_right_trigger_key.as_ref() == Some(key) {
            self.state.hotkeys().set_full_right(true);
            debug!("Full right trigger held ({})", key);
            return KeyAction::FullRightTrigger(true);
        }
        match self.config.key_to_button(key) {
            Some(button) => {
                self.pad.press(button);
                debug!("Button {} pressed ({})", button, key);
                KeyAction::Button {
                    button,
                    pressed: true,
                }
            }
            None => {
                trace!("Unmapped key pressed: {}", key);
                KeyAction::Ignored
            }
        }
    }

    pub fn on_release(&self, key: &KeyId) -> KeyAction {
        if *key == self.config.reset_key {
            return KeyAction::Ignored;
        }
        if self.config.full_left_trigger_key.as_ref() == Some(key) {
            self.state.hotkeys().set_full_left(false);
            debug!("Full left trigger released ({})", key);
            return KeyAction::FullLeftTrigger(false);
        }
        if self.config.full_right_trigger_key.as_ref() == Some(key) {
            self.state.hotkeys().set_full_right(false);
            debug!("Full right trigger released ({})", key);
            return KeyAction::FullRightTrigger(false);
        }
        match self.config.key_to_button(key) {
            Some(button) => {
                self.pad.release_button(button);
                debug!("Button {} released ({})", button, key);
                KeyAction::Button {
                    button,
                    pressed: false,
                }
            }
            None => KeyAction::Ignored,
        }
    }
}

/// Routes every input event to the state or the key handler
pub struct InputDispatcher {
    state: Arc<InputState>,
    keys: KeyHandler,
}

impl InputDispatcher {
    pub fn new(state: Arc<InputState>, keys: KeyHandler) -> Self {
        Self { state, keys }
    }

    /// Apply one event; returns the key action for key events
    pub fn handle(&self, event: &InputEvent) -> Option<KeyAction> {
        match event {
            InputEvent::MouseMove { x, y } => {
                self.state.record_mouse_move(*x, *y);
                None
            }
            InputEvent::KeyPress(key) => Some(self.keys.on_press(key)),
            InputEvent::KeyRelease(key) => Some(self.keys.on_release(key)),
        }
    }

    /// Spawn the sequential event processor task
    ///
    /// The task ends once every sender has been dropped.
    pub fn spawn(self, mut rx: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("Input dispatcher started");
            while let Some(event) = rx.recv().await {
                self.handle(&event);
            }
            debug!("Input dispatcher stopped (all sources closed)");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MappingEntry, MappingTable};
    use crate::pad::recording::{RecordingSink, SinkCall, SinkLog};

    fn test_config() -> AppConfig {
        AppConfig {
            reset_key: KeyId::named("f8"),
            full_left_trigger_key: Some(KeyId::Char('q')),
            full_right_trigger_key: Some(KeyId::Char('e')),
            mappings: MappingTable::from_entries([
                MappingEntry::new(KeyId::Char('j'), ButtonId::A),
                MappingEntry::new(KeyId::named("shift"), ButtonId::LeftShoulder),
                // Shadowed by the reset key
                MappingEntry::new(KeyId::named("f8"), ButtonId::Start),
            ]),
            ..AppConfig::default()
        }
    }

    fn setup() -> (InputDispatcher, Arc<InputState>, SinkLog) {
        let (sink, log) = RecordingSink::new();
        let pad = Arc::new(PadOutput::new(Box::new(sink)));
        let state = Arc::new(InputState::new());
        let keys = KeyHandler::new(Arc::new(test_config()), state.clone(), pad);
        (InputDispatcher::new(state.clone(), keys), state, log)
    }

    fn press(key: &str) -> InputEvent {
        InputEvent::KeyPress(KeyId::parse(key).unwrap())
    }

    fn release(key: &str) -> InputEvent {
        InputEvent::KeyRelease(KeyId::parse(key).unwrap())
    }

    #[test]
    fn test_mapped_key_press_release() {
        let (dispatcher, _state, log) = setup();

        assert_eq!(
            dispatcher.handle(&press("j")),
            Some(KeyAction::Button { button: ButtonId::A, pressed: true })
        );
        assert_eq!(
            dispatcher.handle(&release("J")),
            Some(KeyAction::Button { button: ButtonId::A, pressed: false })
        );

        assert_eq!(
            log.calls(),
            vec![
                SinkCall::Press(ButtonId::A),
                SinkCall::Flush,
                SinkCall::Release(ButtonId::A),
                SinkCall::Flush,
            ]
        );
        assert!(!log.has_axis_calls());
    }

    #[test]
    fn test_either_shift_triggers_mapping() {
        let (dispatcher, _state, log) = setup();

        dispatcher.handle(&press("shift_l"));
        dispatcher.handle(&release("shift_l"));
        dispatcher.handle(&press("shift_r"));
        dispatcher.handle(&release("shift_r"));

        assert_eq!(log.count(&SinkCall::Press(ButtonId::LeftShoulder)), 2);
        assert_eq!(log.count(&SinkCall::Release(ButtonId::LeftShoulder)), 2);
    }

    #[test]
    fn test_reset_wins_over_mapping() {
        let (dispatcher, state, log) = setup();
        state.accumulate_and_clamp(10, -10, crate::state::Sensitivity { x: 5.0, trigger: 1.0 });

        assert_eq!(dispatcher.handle(&press("keyboard.Key.f8")), Some(KeyAction::Reset));
        assert_eq!(state.axis().stick_x, 0);
        assert_eq!(state.axis().trigger_axis, 0);

        // No release behavior, no button traffic
        assert_eq!(dispatcher.handle(&release("f8")), Some(KeyAction::Ignored));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_hotkeys_set_and_clear_flags() {
        let (dispatcher, state, log) = setup();

        assert_eq!(dispatcher.handle(&press("q")), Some(KeyAction::FullLeftTrigger(true)));
        assert!(state.hotkeys().full_left());
        assert!(!state.hotkeys().full_right());

        assert_eq!(dispatcher.handle(&press("E")), Some(KeyAction::FullRightTrigger(true)));
        assert!(state.hotkeys().full_right());

        dispatcher.handle(&release("q"));
        assert!(!state.hotkeys().full_left());
        assert!(state.hotkeys().full_right());

        dispatcher.handle(&release("e"));
        assert!(!state.hotkeys().full_right());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_hotkeys_match_either_modifier_side() {
        let (sink, log) = RecordingSink::new();
        let pad = Arc::new(PadOutput::new(Box::new(sink)));
        let state = Arc::new(InputState::new());
        let config = AppConfig {
            reset_key: KeyId::named("shift"),
            full_right_trigger_key: Some(KeyId::named("ctrl")),
            ..AppConfig::default()
        };
        let dispatcher = InputDispatcher::new(
            state.clone(),
            KeyHandler::new(Arc::new(config), state.clone(), pad),
        );
        state.accumulate_and_clamp(10, -10, crate::state::Sensitivity { x: 5.0, trigger: 1.0 });

        // Reset wins over the default shift → left shoulder mapping
        assert_eq!(dispatcher.handle(&press("shift_r")), Some(KeyAction::Reset));
        assert_eq!(state.axis(), crate::state::AccumulatedAxis::default());
        assert_eq!(dispatcher.handle(&press("Shift_L")), Some(KeyAction::Reset));

        assert_eq!(dispatcher.handle(&press("ctrl_l")), Some(KeyAction::FullRightTrigger(true)));
        assert!(state.hotkeys().full_right());
        assert_eq!(dispatcher.handle(&release("control_r")), Some(KeyAction::FullRightTrigger(false)));
        assert!(!state.hotkeys().full_right());

        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_key_repeat_is_idempotent() {
        let (dispatcher, state, _log) = setup();
        dispatcher.handle(&press("q"));
        dispatcher.handle(&press("q"));
        assert!(state.hotkeys().full_left());
        dispatcher.handle(&release("q"));
        assert!(!state.hotkeys().full_left());
    }

    #[test]
    fn test_unmapped_keys_are_ignored() {
        let (dispatcher, state, log) = setup();
        assert_eq!(dispatcher.handle(&press("z")), Some(KeyAction::Ignored));
        assert_eq!(dispatcher.handle(&release("z")), Some(KeyAction::Ignored));
        assert!(log.calls().is_empty());
        assert!(!state.hotkeys().full_left());
    }

    #[test]
    fn test_mouse_moves_only_touch_state() {
        let (dispatcher, state, log) = setup();
        assert_eq!(dispatcher.handle(&InputEvent::MouseMove { x: 3, y: 4 }), None);
        assert_eq!(state.mouse().map(|m| (m.x, m.y)), Some((3, 4)));
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatcher_drains_in_order_and_stops() {
        let (dispatcher, state, log) = setup();
        let (tx, rx) = channel();
        let task = dispatcher.spawn(rx);

        tx.send(InputEvent::MouseMove { x: 0, y: 0 }).unwrap();
        tx.send(press("j")).unwrap();
        tx.send(InputEvent::MouseMove { x: 7, y: 0 }).unwrap();
        tx.send(release("j")).unwrap();
        drop(tx);

        task.await.unwrap();
        assert_eq!(state.drain_delta(), (7, 0));

        // The finished task dropped the last pad handle, which neutralized the device
        assert_eq!(
            log.calls(),
            vec![
                SinkCall::Press(ButtonId::A),
                SinkCall::Flush,
                SinkCall::Release(ButtonId::A),
                SinkCall::Flush,
                SinkCall::Neutral,
                SinkCall::Flush,
            ]
        );
    }
}
