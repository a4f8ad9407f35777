use crate::message::{CorrelationId, Message};
use std::time::Duration;

/// Events an extension thread's inbox carries. Lifecycle events take
/// priority over timers, which take priority over inbox messages (spec
/// §4.3 "Dispatch loop"); `run()` enforces that ordering by construction —
/// lifecycle phases are driven to completion before the main dispatch loop
/// (which interleaves `Deliver` and timer firings) ever starts.
pub enum ThreadEvent {
    /// A message routed to exactly one extension in this group.
    Deliver(Message),
    /// Registers a timeout for a pending `send_cmd` (spec §5).
    ScheduleTimeout { correlation_id: CorrelationId, after: Duration },
    /// Wakes the startup/shutdown driver to recheck lifecycle gate bits.
    LifecycleAdvance,
    Close,
}
