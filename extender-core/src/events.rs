//! Activity reporting for the controller.
//!
//! The state machine stays silent on its own; every externally visible action
//! is pushed through an [`EventRecorder`] so the firmware can mirror it to
//! defmt, the emulator can print it, and tests can assert on it.

use crate::extender::Stage;
use crate::sustain::SustainBand;

/// Externally visible actions taken by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtenderEvent {
    /// The user cap integrator applied a new band derived from `cap`.
    CapApplied { cap: u8, band: SustainBand },
    /// The integrator released the charger to run unmanaged.
    CapUnmanaged,
    /// A stage deadline fired and its band was commanded.
    StageEngaged { stage: Stage, band: SustainBand },
    /// The reset deadline fired; the cycle restarted from normal.
    CycleReset,
    /// Disable or factory mode collapsed the state machine.
    Halted,
    /// The persistent cap store failed a read or write.
    StoreFailed,
}

/// Sink for controller events.
pub trait EventRecorder {
    fn record(&mut self, event: ExtenderEvent);
}

/// Recorder that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRecorder;

impl NoopRecorder {
    pub const fn new() -> Self {
        Self
    }
}

impl EventRecorder for NoopRecorder {
    fn record(&mut self, _: ExtenderEvent) {}
}

/// Bounded in-memory recorder; newer events displace nothing, they are
/// dropped once the buffer fills.
#[derive(Clone, Debug, Default)]
pub struct EventLog<const CAPACITY: usize> {
    events: heapless::Vec<ExtenderEvent, CAPACITY>,
}

impl<const CAPACITY: usize> EventLog<CAPACITY> {
    /// Creates an empty log.
    pub const fn new() -> Self {
        Self {
            events: heapless::Vec::new(),
        }
    }

    /// Returns the recorded events in arrival order.
    pub fn events(&self) -> &[ExtenderEvent] {
        &self.events
    }

    /// Returns the most recent event, if any.
    pub fn latest(&self) -> Option<&ExtenderEvent> {
        self.events.last()
    }

    /// Drops all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<const CAPACITY: usize> EventRecorder for EventLog<CAPACITY> {
    fn record(&mut self, event: ExtenderEvent) {
        let _ = self.events.push(event);
    }
}
