//! Deferred-call capability for non-blocking operation.
//!
//! In non-blocking mode the engine never waits: after writing the sync break
//! it registers a `(step, delay)` token with an external scheduler and
//! returns. The embedding application is responsible for eventually calling
//! [`LinMaster::step`](crate::master::LinMaster::step) with that token once
//! the delay has elapsed. Calling a step while the machine is not in the
//! matching state is rejected the same way as a misused public entry point.

use core::time::Duration;

/// Which engine step the scheduler should invoke after the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Frame-body transmission, due once the break has gone out.
    Send,
    /// Echo/response validation, due once the frame body has gone out.
    Receive,
}

/// Scheduler as seen by the engine: "run this step after at least `delay`".
///
/// The engine does not own or implement the scheduler; `&mut T` forwards
/// the trait so a shared scheduler can be borrowed per engine.
pub trait Scheduler {
    fn schedule(&mut self, step: Step, delay: Duration);
}

/// Placeholder scheduler for blocking-only engines.
///
/// Blocking mode drives both steps synchronously and never defers, so the
/// tokens are simply dropped. Do not pair this with non-blocking mode: the
/// transaction would stall in `BreakSent` until stepped by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn schedule(&mut self, _step: Step, _delay: Duration) {}
}

impl<T: Scheduler + ?Sized> Scheduler for &mut T {
    fn schedule(&mut self, step: Step, delay: Duration) {
        (**self).schedule(step, delay)
    }
}
