//! Fixed-rate update loop
//!
//! Every tick the loop drains the mouse delta, folds it into the
//! accumulators, turns the accumulators into an axis [`Frame`] (stick X,
//! trigger split, hotkey overrides) and pushes that frame to the device.
//! Button edges do not go through here; the key handler commits them as
//! soon as they happen.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::pad::{Frame, PadOutput};
use crate::state::{AccumulatedAxis, InputState, Sensitivity};

/// Trigger value forced by a held full-trigger hotkey
pub const TRIGGER_MAX: u8 = u8::MAX;

/// Source of loop ticks
#[async_trait]
pub trait Ticker: Send {
    /// Wait until the next tick is due
    async fn tick(&mut self);
}

/// Real-time ticker at a fixed rate
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(rate_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
        let mut interval = interval(period);
        // Late ticks are not replayed in a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Hotkey state sampled once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub full_left: bool,
    pub full_right: bool,
}

/// Split the signed trigger axis into (left, right) magnitudes
///
/// Positive drives the right trigger, negative the left; never both.
pub fn split_triggers(trigger_axis: i64) -> (u8, u8) {
    let magnitude = trigger_axis.unsigned_abs().min(u64::from(TRIGGER_MAX)) as u8;
    match trigger_axis.signum() {
        1 => (0, magnitude),
        -1 => (magnitude, 0),
        _ => (0, 0),
    }
}

/// Build the frame for one tick from the accumulators and hotkey overrides
pub fn synthesize(axis: AccumulatedAxis, overrides: Overrides) -> Frame {
    let (raw_left, raw_right) = split_triggers(axis.trigger_axis);

    Frame {
        stick_x: axis.stick_x.clamp(i16::MIN.into(), i16::MAX.into()) as i16,
        // Vertical movement feeds the triggers, never the stick
        stick_y: 0,
        left_trigger: if overrides.full_left { TRIGGER_MAX } else { raw_left },
        right_trigger: if overrides.full_right { TRIGGER_MAX } else { raw_right },
    }
}

/// The periodic task converting accumulated mouse motion into axis frames
pub struct UpdateLoop {
    state: Arc<InputState>,
    pad: Arc<PadOutput>,
    sensitivity: Sensitivity,
    ticks: u64,
}

impl UpdateLoop {
    pub fn new(state: Arc<InputState>, pad: Arc<PadOutput>, sensitivity: Sensitivity) -> Self {
        Self {
            state,
            pad,
            sensitivity,
            ticks: 0,
        }
    }

    /// Run one tick: drain, accumulate, synthesize, push and flush
    pub fn step(&mut self) -> Frame {
        let axis = self.state.advance(self.sensitivity);
        let hotkeys = self.state.hotkeys();
        let overrides = Overrides {
            full_left: hotkeys.full_left(),
            full_right: hotkeys.full_right(),
        };

        let frame = synthesize(axis, overrides);
        self.pad.submit(frame);
        self.ticks += 1;
        trace!(tick = self.ticks, ?frame, "Frame submitted");
        frame
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick until `shutdown` resolves, then reset the device to neutral
    pub async fn run<T: Ticker>(mut self, mut ticker: T, shutdown: impl Future<Output = ()>) -> u64 {
        info!("Update loop started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    debug!("Update loop received shutdown");
                    break;
                }
                _ = ticker.tick() => {
                    self.step();
                }
            }
        }

        self.pad.release();
        info!("Update loop stopped after {} ticks", self.ticks);
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::recording::{RecordingSink, SinkCall, SinkLog};
    use proptest::prelude::*;
    use tokio::sync::{mpsc, oneshot};

    fn setup(sensitivity: Sensitivity) -> (UpdateLoop, Arc<InputState>, Arc<PadOutput>, SinkLog) {
        let (sink, log) = RecordingSink::new();
        let pad = Arc::new(PadOutput::new(Box::new(sink)));
        let state = Arc::new(InputState::new());
        let update = UpdateLoop::new(state.clone(), pad.clone(), sensitivity);
        (update, state, pad, log)
    }

    /// Ticker driven by the test through a channel
    struct ManualTicker(mpsc::UnboundedReceiver<()>);

    #[async_trait]
    impl Ticker for ManualTicker {
        async fn tick(&mut self) {
            if self.0.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
    }

    #[test]
    fn test_split_triggers() {
        assert_eq!(split_triggers(20), (0, 20));
        assert_eq!(split_triggers(-50), (50, 0));
        assert_eq!(split_triggers(0), (0, 0));
        assert_eq!(split_triggers(255), (0, 255));
        assert_eq!(split_triggers(-255), (255, 0));
    }

    #[test]
    fn test_stick_from_horizontal_motion() {
        let (mut update, state, _pad, log) = setup(Sensitivity { x: 50.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(10, 0);

        let frame = update.step();
        assert_eq!(frame.stick_x, 500);
        assert_eq!(frame.stick_y, 0);
        assert_eq!(
            log.calls(),
            vec![
                SinkCall::StickX(500),
                SinkCall::StickY(0),
                SinkCall::LeftTrigger(0),
                SinkCall::RightTrigger(0),
                SinkCall::Flush,
            ]
        );
    }

    #[test]
    fn test_pointer_up_drives_right_trigger() {
        let (mut update, state, _pad, _log) = setup(Sensitivity { x: 50.0, trigger: 1.0 });
        state.record_mouse_move(0, 100);
        state.record_mouse_move(0, 80);

        let frame = update.step();
        assert_eq!(state.axis().trigger_axis, 20);
        assert_eq!((frame.left_trigger, frame.right_trigger), (0, 20));
    }

    #[test]
    fn test_stick_saturates() {
        let (mut update, state, _pad, _log) = setup(Sensitivity { x: 1.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(32760, 0);
        assert_eq!(update.step().stick_x, 32760);

        state.record_mouse_move(32860, 0);
        assert_eq!(update.step().stick_x, 32767);
    }

    #[test]
    fn test_values_persist_between_ticks() {
        let (mut update, state, _pad, _log) = setup(Sensitivity { x: 2.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(-30, 0);
        assert_eq!(update.step().stick_x, -60);

        // No motion: accumulated value is held, not decayed
        assert_eq!(update.step().stick_x, -60);
        assert_eq!(update.ticks(), 2);
    }

    #[test]
    fn test_reset_applies_on_next_tick() {
        let (mut update, state, _pad, _log) = setup(Sensitivity { x: 10.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(25, -40);
        let frame = update.step();
        assert_ne!(frame, Frame::default());

        state.reset_accumulators();
        assert_eq!(update.step(), Frame::default());
    }

    #[test]
    fn test_full_right_hotkey_keeps_left_from_mouse() {
        let (mut update, state, _pad, log) = setup(Sensitivity { x: 1.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(0, 50);
        state.hotkeys().set_full_right(true);

        let frame = update.step();
        assert_eq!(state.axis().trigger_axis, -50);
        assert_eq!((frame.left_trigger, frame.right_trigger), (50, 255));
        assert_eq!(log.last_triggers(), Some((50, 255)));
    }

    #[test]
    fn test_full_left_hotkey_reverts_on_release() {
        let (mut update, state, _pad, _log) = setup(Sensitivity { x: 1.0, trigger: 1.0 });
        state.record_mouse_move(0, 0);
        state.record_mouse_move(0, 30);

        state.hotkeys().set_full_left(true);
        assert_eq!(update.step().left_trigger, 255);

        state.hotkeys().set_full_left(false);
        assert_eq!(update.step().left_trigger, 30);
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown_then_neutralizes() {
        let (update, state, pad, log) = setup(Sensitivity { x: 1.0, trigger: 1.0 });
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        state.record_mouse_move(0, 0);
        state.record_mouse_move(5, 0);
        tick_tx.send(()).unwrap();
        tick_tx.send(()).unwrap();

        let task = tokio::spawn(update.run(ManualTicker(tick_rx), async {
            let _ = stop_rx.await;
        }));

        // Let both queued ticks run before stopping
        while log.count(&SinkCall::StickX(5)) < 2 {
            tokio::task::yield_now().await;
        }
        stop_tx.send(()).unwrap();
        let ticks = task.await.unwrap();

        assert_eq!(ticks, 2);
        assert!(pad.is_released());
        let calls = log.calls();
        assert_eq!(calls[calls.len() - 2..], [SinkCall::Neutral, SinkCall::Flush]);
        assert_eq!(log.count(&SinkCall::Neutral), 1);

        // Dropping the last handle must not reset a second time
        drop(pad);
        assert_eq!(log.count(&SinkCall::Neutral), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_rate() {
        let mut ticker = IntervalTicker::new(60);
        assert_eq!(ticker.period(), Duration::from_secs_f64(1.0 / 60.0));

        let start = tokio::time::Instant::now();
        // First tick completes immediately
        for _ in 0..61 {
            ticker.tick().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(999), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(1001), "elapsed {:?}", elapsed);
    }

    proptest! {
        #[test]
        fn prop_mouse_triggers_never_both(trigger_axis in -255i64..=255) {
            let (left, right) = split_triggers(trigger_axis);
            prop_assert!(left == 0 || right == 0);
        }

        #[test]
        fn prop_full_left_override_is_exact(trigger_axis in -255i64..=255, stick_x in -32768i64..=32767, right_held: bool) {
            let axis = AccumulatedAxis { stick_x, trigger_axis };
            let (_, raw_right) = split_triggers(trigger_axis);

            let frame = synthesize(axis, Overrides { full_left: true, full_right: right_held });
            prop_assert_eq!(frame.left_trigger, 255);
            prop_assert_eq!(frame.right_trigger, if right_held { 255 } else { raw_right });
            prop_assert_eq!(frame.stick_x as i64, stick_x);
            prop_assert_eq!(frame.stick_y, 0);
        }
    }
}
