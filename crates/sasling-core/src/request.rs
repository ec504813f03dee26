use crate::device::DeviceResult;
use sasling_proto::SmpFunction;

/// One SMP command in flight.
///
/// The device machine drives the lifecycle through these hooks and reacts to
/// their statuses without reinterpreting them. Frame buffer contents are the
/// request's own business.
pub trait SmpRequest {
    /// Management function the command carries.
    fn function(&self) -> SmpFunction;

    /// Hand the request to the hardware queue.
    fn start(&mut self) -> DeviceResult<()>;

    /// Finalize lifecycle bookkeeping after the hardware finished.
    fn complete(&mut self) -> DeviceResult<()>;

    /// Deliver an unsolicited frame owned by this request.
    fn frame_handler(&mut self, frame_index: u32) -> DeviceResult<()>;
}

/// Per-device lifecycle tracker: at most one working request plus the
/// outstanding-request counter.
///
/// The slot never overwrites silently; an install onto an occupied slot hands
/// the request back to the caller.
#[derive(Debug)]
pub(crate) struct RequestSlot<R> {
    working: Option<R>,
    outstanding: u32,
}

impl<R> RequestSlot<R> {
    pub(crate) fn new() -> Self {
        Self {
            working: None,
            outstanding: 0,
        }
    }

    /// Record a started request. Fails by returning the request when the slot
    /// is already occupied.
    pub(crate) fn install(&mut self, request: R) -> Result<(), R> {
        if self.working.is_some() {
            return Err(request);
        }
        self.working = Some(request);
        self.outstanding = self.outstanding.saturating_add(1);
        Ok(())
    }

    /// Remove the working request for a completion attempt. The outstanding
    /// counter is untouched until the completion commits.
    pub(crate) fn take(&mut self) -> Option<R> {
        self.working.take()
    }

    /// Reinstate the working request after a failed completion attempt.
    pub(crate) fn restore(&mut self, request: R) {
        debug_assert!(self.working.is_none(), "restore onto an occupied slot");
        self.working = Some(request);
    }

    /// Commit a completed request: drop it from the outstanding count.
    pub(crate) fn retire(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Detach the working request entirely (stop path). The caller takes over
    /// cleanup, so the request leaves the outstanding count as well.
    pub(crate) fn detach(&mut self) -> Option<R> {
        let detached = self.working.take();
        if detached.is_some() {
            self.outstanding = self.outstanding.saturating_sub(1);
        }
        detached
    }

    /// Drop any residual working reference. Invariant-restoring step run on
    /// every Cmd exit; the completion and stop paths detach the request
    /// before the transition runs, so this is normally a no-op.
    pub(crate) fn clear(&mut self) {
        self.working = None;
    }

    pub(crate) fn working(&self) -> Option<&R> {
        self.working.as_ref()
    }

    pub(crate) fn working_mut(&mut self) -> Option<&mut R> {
        self.working.as_mut()
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.working.is_some()
    }

    pub(crate) fn outstanding(&self) -> u32 {
        self.outstanding
    }
}
