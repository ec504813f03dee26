use crate::handlers::{handler_table, ReadyStateHandlers};
use crate::metrics;
use crate::notify::{NotReadyReason, NotifySink};
use crate::port::RemotePort;
use crate::request::{RequestSlot, SmpRequest};
use crate::rnc::RemoteNodeContext;
use std::fmt;
use tracing::{debug, warn};

/// Device error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// Operation not permitted in the current sub-state.
    InvalidState,
    /// Port or remote node context declined admission.
    ResourceRejected,
    /// The request itself failed to start or complete.
    RequestFailure,
}

/// Errors surfaced by [`RemoteDevice`] and its collaborators.
///
/// Collaborator seams return this type directly, so a declined admission or
/// a failed request reaches the caller unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceError {
    kind: DeviceErrorKind,
    message: Option<String>,
}

impl DeviceError {
    pub const fn new(kind: DeviceErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub const fn kind(&self) -> DeviceErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "{:?}: {msg}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

pub(crate) fn invalid_state(operation: &'static str) -> DeviceError {
    DeviceError::with_message(
        DeviceErrorKind::InvalidState,
        format!("{operation} not permitted in current state"),
    )
}

/// Rejected `start_io`: the status plus ownership of the request, which the
/// caller keeps to retry or release.
pub struct StartIoError<R> {
    pub request: R,
    pub error: DeviceError,
}

impl<R> fmt::Debug for StartIoError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartIoError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<R> fmt::Display for StartIoError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<R> std::error::Error for StartIoError<R> {}

/// Opaque identity of a hardware-addressable target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SasAddress(pub u64);

impl fmt::Display for SasAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Ready sub-state of a remote device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    /// No outstanding request; new I/O is accepted.
    Idle,
    /// One request outstanding; new I/O is rejected until it completes.
    Cmd,
}

/// One hardware-addressable target reachable through a port.
///
/// The device cycles Idle and Cmd for every SMP command issued and enforces
/// the single-outstanding-command rule: `working_request` is present exactly
/// while the state is Cmd. Callers serialize operations per device; handlers
/// run synchronously in the calling context and never block.
pub struct RemoteDevice<P, C, N, R> {
    address: SasAddress,
    state: DeviceState,
    stopped: bool,
    pub(crate) port: P,
    pub(crate) rnc: C,
    pub(crate) notify: N,
    pub(crate) requests: RequestSlot<R>,
}

impl<P, C, N, R> RemoteDevice<P, C, N, R>
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    /// Construct a device and enter the Idle sub-state.
    ///
    /// Entry into the readiness machine is externally observable: exactly one
    /// ready notification fires here.
    pub fn new(address: SasAddress, port: P, rnc: C, notify: N) -> Self {
        let mut device = Self {
            address,
            state: DeviceState::Idle,
            stopped: false,
            port,
            rnc,
            notify,
            requests: RequestSlot::new(),
        };
        device.enter_state(DeviceState::Idle);
        device
    }

    pub fn address(&self) -> SasAddress {
        self.address
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The request currently occupying the device, if any.
    pub fn working_request(&self) -> Option<&R> {
        self.requests.working()
    }

    pub fn outstanding_requests(&self) -> u32 {
        self.requests.outstanding()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn rnc(&self) -> &C {
        &self.rnc
    }

    pub fn notify(&self) -> &N {
        &self.notify
    }

    /// Begin a new SMP request.
    ///
    /// Admission runs in order: port gate, hardware context, then the request
    /// itself. Any failure leaves the device untouched and hands the request
    /// back together with the collaborator's status.
    pub fn start_io(&mut self, request: R) -> Result<(), StartIoError<R>> {
        if self.stopped {
            warn!(device = %self.address, operation = "start_io", "operation on stopped device");
            return Err(StartIoError {
                request,
                error: invalid_state("start_io"),
            });
        }
        self.handlers().start_io(self, request)
    }

    /// Complete the working request.
    ///
    /// Returns the finished request for the caller to release. On failure the
    /// device stays in Cmd with the working request retained; resolution is a
    /// higher-layer responsibility.
    pub fn complete_io(&mut self) -> DeviceResult<R> {
        self.ensure_active("complete_io")?;
        self.handlers().complete_io(self)
    }

    /// Deliver an unsolicited frame to whichever request owns the device.
    pub fn frame(&mut self, frame_index: u32) -> DeviceResult<()> {
        self.ensure_active("frame")?;
        self.handlers().frame(self, frame_index)
    }

    /// Stop the device. Both sub-states share this path.
    ///
    /// Any working request is detached and returned for cleanup; afterwards
    /// every operation fails with an invalid-state status.
    pub fn stop(&mut self) -> DeviceResult<Option<R>> {
        self.ensure_active("stop")?;
        self.handlers().stop(self)
    }

    pub fn start(&mut self) -> DeviceResult<()> {
        self.ensure_active("start")?;
        self.handlers().start(self)
    }

    pub fn fail(&mut self) -> DeviceResult<()> {
        self.ensure_active("fail")?;
        self.handlers().fail(self)
    }

    pub fn destruct(&mut self) -> DeviceResult<()> {
        self.ensure_active("destruct")?;
        self.handlers().destruct(self)
    }

    pub fn reset(&mut self) -> DeviceResult<()> {
        self.ensure_active("reset")?;
        self.handlers().reset(self)
    }

    pub fn reset_complete(&mut self) -> DeviceResult<()> {
        self.ensure_active("reset_complete")?;
        self.handlers().reset_complete(self)
    }

    pub fn continue_io(&mut self) -> DeviceResult<()> {
        self.ensure_active("continue_io")?;
        self.handlers().continue_io(self)
    }

    pub fn start_task(&mut self) -> DeviceResult<()> {
        self.ensure_active("start_task")?;
        self.handlers().start_task(self)
    }

    pub fn complete_task(&mut self) -> DeviceResult<()> {
        self.ensure_active("complete_task")?;
        self.handlers().complete_task(self)
    }

    pub fn suspend(&mut self) -> DeviceResult<()> {
        self.ensure_active("suspend")?;
        self.handlers().suspend(self)
    }

    pub fn resume(&mut self) -> DeviceResult<()> {
        self.ensure_active("resume")?;
        self.handlers().resume(self)
    }

    pub fn event(&mut self, event_code: u32) -> DeviceResult<()> {
        self.ensure_active("event")?;
        self.handlers().event(self, event_code)
    }

    fn handlers(&self) -> &'static dyn ReadyStateHandlers<P, C, N, R> {
        handler_table(self.state)
    }

    fn ensure_active(&self, operation: &'static str) -> DeviceResult<()> {
        if self.stopped {
            warn!(device = %self.address, operation, "operation on stopped device");
            return Err(invalid_state(operation));
        }
        Ok(())
    }

    /// Drive a sub-state change: exit hook, state mutation, enter hook, in
    /// that order. Cmd's exit hook clears the working slot before Idle's
    /// enter logic runs.
    pub(crate) fn transition(&mut self, next: DeviceState) {
        let previous = self.state;
        self.exit_state(previous);
        self.state = next;
        self.enter_state(next);
        self.check_invariant();
    }

    fn exit_state(&mut self, state: DeviceState) {
        match state {
            DeviceState::Idle => {}
            DeviceState::Cmd => self.requests.clear(),
        }
    }

    // The active handler set follows `state`, so entering a sub-state is
    // what installs its table.
    fn enter_state(&mut self, state: DeviceState) {
        match state {
            DeviceState::Idle => {
                debug!(device = %self.address, "device ready");
                self.notify.device_ready(self.address);
            }
            DeviceState::Cmd => {
                debug!(device = %self.address, "smp request started");
                self.notify
                    .device_not_ready(self.address, NotReadyReason::SmpRequestStarted);
            }
        }
    }

    pub(crate) fn ready_state_stop(&mut self) -> DeviceResult<Option<R>> {
        self.port.stop_handler(self.address)?;
        let aborted = self.requests.detach();
        if self.state == DeviceState::Cmd {
            // Leaving the readiness machine, not becoming ready: run the Cmd
            // exit hook but skip Idle's enter logic.
            self.exit_state(DeviceState::Cmd);
            self.state = DeviceState::Idle;
        }
        self.stopped = true;
        debug!(device = %self.address, aborted = aborted.is_some(), "device stopped");
        self.notify
            .device_not_ready(self.address, NotReadyReason::StopRequested);
        self.check_invariant();
        Ok(aborted)
    }

    pub(crate) fn default_frame_handler(&mut self, frame_index: u32) -> DeviceResult<()> {
        warn!(
            device = %self.address,
            frame_index,
            "unsolicited frame with no owning request"
        );
        metrics::observe_frame_dropped();
        Err(invalid_state("frame"))
    }

    fn check_invariant(&self) {
        debug_assert_eq!(
            self.state == DeviceState::Cmd,
            self.requests.is_occupied(),
            "working request tracking out of sync with sub-state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::route_frame;
    use sasling_proto::SmpFunction;

    #[derive(Debug, PartialEq, Eq)]
    enum Notification {
        Ready,
        NotReady(NotReadyReason),
    }

    #[derive(Default)]
    struct RecordingNotify {
        events: Vec<Notification>,
    }

    impl NotifySink for RecordingNotify {
        fn device_ready(&mut self, _device: SasAddress) {
            self.events.push(Notification::Ready);
        }

        fn device_not_ready(&mut self, _device: SasAddress, reason: NotReadyReason) {
            self.events.push(Notification::NotReady(reason));
        }
    }

    #[derive(Default)]
    struct MockPort {
        start_calls: u32,
        complete_calls: u32,
        stop_calls: u32,
        fail_start: Option<DeviceError>,
        fail_complete: Option<DeviceError>,
        fail_stop: Option<DeviceError>,
    }

    impl RemotePort for MockPort {
        fn start_io<R: SmpRequest>(
            &mut self,
            _device: SasAddress,
            _request: &R,
        ) -> DeviceResult<()> {
            self.start_calls += 1;
            match self.fail_start.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        fn complete_io<R: SmpRequest>(
            &mut self,
            _device: SasAddress,
            _request: &R,
        ) -> DeviceResult<()> {
            self.complete_calls += 1;
            match self.fail_complete.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        fn stop_handler(&mut self, _device: SasAddress) -> DeviceResult<()> {
            self.stop_calls += 1;
            match self.fail_stop.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct MockRnc {
        start_calls: u32,
        fail_start: Option<DeviceError>,
    }

    impl RemoteNodeContext for MockRnc {
        fn start_io<R: SmpRequest>(
            &mut self,
            _device: SasAddress,
            _request: &R,
        ) -> DeviceResult<()> {
            self.start_calls += 1;
            match self.fail_start.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[derive(Debug, Default)]
    struct MockRequest {
        id: u32,
        started: bool,
        completed: bool,
        frames: Vec<u32>,
        fail_start: Option<DeviceError>,
        fail_complete: Option<DeviceError>,
        frame_status: Option<DeviceError>,
    }

    impl MockRequest {
        fn new(id: u32) -> Self {
            Self {
                id,
                ..Self::default()
            }
        }
    }

    impl SmpRequest for MockRequest {
        fn function(&self) -> SmpFunction {
            SmpFunction::Discover
        }

        fn start(&mut self) -> DeviceResult<()> {
            if let Some(error) = self.fail_start.clone() {
                return Err(error);
            }
            self.started = true;
            Ok(())
        }

        fn complete(&mut self) -> DeviceResult<()> {
            if let Some(error) = self.fail_complete.clone() {
                return Err(error);
            }
            self.completed = true;
            Ok(())
        }

        fn frame_handler(&mut self, frame_index: u32) -> DeviceResult<()> {
            self.frames.push(frame_index);
            match self.frame_status.clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    type TestDevice = RemoteDevice<MockPort, MockRnc, RecordingNotify, MockRequest>;

    fn new_device() -> TestDevice {
        RemoteDevice::new(
            SasAddress(0x5000_C500_1234_ABCD),
            MockPort::default(),
            MockRnc::default(),
            RecordingNotify::default(),
        )
    }

    fn resource_rejected(message: &str) -> DeviceError {
        DeviceError::with_message(DeviceErrorKind::ResourceRejected, message)
    }

    fn request_failure(message: &str) -> DeviceError {
        DeviceError::with_message(DeviceErrorKind::RequestFailure, message)
    }

    fn assert_invariant(device: &TestDevice) {
        assert_eq!(
            device.state() == DeviceState::Cmd,
            device.working_request().is_some()
        );
    }

    #[test]
    fn new_device_enters_idle_ready() {
        let device = new_device();
        assert_eq!(device.state(), DeviceState::Idle);
        assert!(device.working_request().is_none());
        assert!(!device.is_stopped());
        assert_eq!(device.outstanding_requests(), 0);
        assert_eq!(device.notify().events, vec![Notification::Ready]);
    }

    #[test]
    fn start_io_moves_to_cmd() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        assert_eq!(device.state(), DeviceState::Cmd);
        let working = device.working_request().expect("request is working");
        assert_eq!(working.id, 1);
        assert!(working.started);
        assert_eq!(device.outstanding_requests(), 1);
        assert_eq!(device.port().start_calls, 1);
        assert_eq!(device.rnc().start_calls, 1);
        assert_eq!(
            device.notify().events,
            vec![
                Notification::Ready,
                Notification::NotReady(NotReadyReason::SmpRequestStarted),
            ]
        );
        assert_invariant(&device);
    }

    #[test]
    fn start_io_rejected_while_cmd() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        let rejected = device
            .start_io(MockRequest::new(2))
            .expect_err("second request must be rejected");
        assert_eq!(rejected.error.kind(), DeviceErrorKind::InvalidState);
        assert_eq!(rejected.request.id, 2);
        assert!(!rejected.request.started);

        // No collaborator calls and no mutation for the rejected attempt.
        assert_eq!(device.port().start_calls, 1);
        assert_eq!(device.rnc().start_calls, 1);
        assert_eq!(device.state(), DeviceState::Cmd);
        assert_eq!(device.working_request().map(|r| r.id), Some(1));
        assert_eq!(device.notify().events.len(), 2);
        assert_invariant(&device);
    }

    #[test]
    fn complete_io_returns_to_idle() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        let finished = device.complete_io().expect("completion succeeds");
        assert_eq!(finished.id, 1);
        assert!(finished.completed);
        assert_eq!(device.state(), DeviceState::Idle);
        assert!(device.working_request().is_none());
        assert_eq!(device.outstanding_requests(), 0);
        assert_eq!(device.port().complete_calls, 1);
        assert_eq!(
            device.notify().events,
            vec![
                Notification::Ready,
                Notification::NotReady(NotReadyReason::SmpRequestStarted),
                Notification::Ready,
            ]
        );
        assert_invariant(&device);
    }

    #[test]
    fn port_admission_failure_leaves_idle() {
        let mut device = new_device();
        device.port.fail_start = Some(resource_rejected("port resetting"));

        let rejected = device
            .start_io(MockRequest::new(1))
            .expect_err("port declines");
        assert_eq!(rejected.error, resource_rejected("port resetting"));
        assert!(!rejected.request.started);
        assert_eq!(device.rnc().start_calls, 0);
        assert_eq!(device.state(), DeviceState::Idle);
        assert!(device.working_request().is_none());
        assert_eq!(device.notify().events, vec![Notification::Ready]);
        assert_invariant(&device);
    }

    #[test]
    fn rnc_admission_failure_skips_request_start() {
        let mut device = new_device();
        device.rnc.fail_start = Some(resource_rejected("context not established"));

        let rejected = device
            .start_io(MockRequest::new(1))
            .expect_err("context declines");
        assert_eq!(rejected.error, resource_rejected("context not established"));
        assert!(!rejected.request.started);
        assert_eq!(device.port().start_calls, 1);
        assert_eq!(device.state(), DeviceState::Idle);
        assert!(device.working_request().is_none());
        assert_eq!(device.notify().events, vec![Notification::Ready]);
    }

    #[test]
    fn request_start_failure_leaves_idle() {
        let mut device = new_device();
        let mut request = MockRequest::new(1);
        request.fail_start = Some(request_failure("queue full"));

        let rejected = device.start_io(request).expect_err("request fails to start");
        assert_eq!(rejected.error, request_failure("queue full"));
        assert_eq!(device.state(), DeviceState::Idle);
        assert!(device.working_request().is_none());
        assert_eq!(device.notify().events, vec![Notification::Ready]);
    }

    #[test]
    fn complete_io_request_failure_keeps_cmd() {
        let mut device = new_device();
        let mut request = MockRequest::new(1);
        request.fail_complete = Some(request_failure("bookkeeping failed"));
        device.start_io(request).expect("admission succeeds");

        let error = device.complete_io().expect_err("completion fails");
        assert_eq!(error, request_failure("bookkeeping failed"));
        assert_eq!(device.state(), DeviceState::Cmd);
        assert_eq!(device.working_request().map(|r| r.id), Some(1));
        assert_eq!(device.port().complete_calls, 0);
        assert_eq!(device.notify().events.len(), 2);
        assert_invariant(&device);
    }

    #[test]
    fn complete_io_port_failure_keeps_cmd_until_retried() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");
        device.port.fail_complete = Some(resource_rejected("accounting failed"));

        let error = device.complete_io().expect_err("port accounting fails");
        assert_eq!(error, resource_rejected("accounting failed"));
        assert_eq!(device.state(), DeviceState::Cmd);
        let working = device.working_request().expect("request retained");
        assert_eq!(working.id, 1);
        assert!(working.completed);
        assert_eq!(device.notify().events.len(), 2);
        assert_invariant(&device);

        // Half-open retry: a later attempt may resolve the completion.
        device.port.fail_complete = None;
        let finished = device.complete_io().expect("retry succeeds");
        assert_eq!(finished.id, 1);
        assert_eq!(device.state(), DeviceState::Idle);
        assert_invariant(&device);
    }

    #[test]
    fn frame_routed_to_working_request() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        route_frame(&mut device, 42).expect("frame handled");
        assert_eq!(
            device.working_request().expect("request is working").frames,
            vec![42]
        );
    }

    #[test]
    fn frame_status_passes_through_unchanged() {
        let mut device = new_device();
        let mut request = MockRequest::new(1);
        request.frame_status = Some(request_failure("bad frame"));
        device.start_io(request).expect("admission succeeds");

        let error = route_frame(&mut device, 7).expect_err("status passthrough");
        assert_eq!(error, request_failure("bad frame"));
        assert_eq!(
            device.working_request().expect("request is working").frames,
            vec![7]
        );
    }

    #[test]
    fn frames_delivered_in_order() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        for index in [3, 1, 8] {
            route_frame(&mut device, index).expect("frame handled");
        }
        assert_eq!(
            device.working_request().expect("request is working").frames,
            vec![3, 1, 8]
        );
    }

    #[test]
    fn frame_in_idle_hits_default_policy() {
        let mut device = new_device();
        let error = route_frame(&mut device, 9).expect_err("no owner in idle");
        assert_eq!(error.kind(), DeviceErrorKind::InvalidState);
        assert_eq!(device.notify().events, vec![Notification::Ready]);
    }

    #[test]
    fn stop_without_outstanding_request() {
        let mut device = new_device();
        let aborted = device.stop().expect("stop succeeds");
        assert!(aborted.is_none());
        assert!(device.is_stopped());
        assert_eq!(device.port().stop_calls, 1);
        assert_eq!(
            device.notify().events,
            vec![
                Notification::Ready,
                Notification::NotReady(NotReadyReason::StopRequested),
            ]
        );

        let rejected = device
            .start_io(MockRequest::new(1))
            .expect_err("stopped device rejects");
        assert_eq!(rejected.error.kind(), DeviceErrorKind::InvalidState);
        assert_eq!(device.port().start_calls, 0);
        assert_eq!(
            device.suspend().expect_err("stopped device rejects").kind(),
            DeviceErrorKind::InvalidState
        );
    }

    #[test]
    fn stop_detaches_outstanding_request() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");

        let aborted = device.stop().expect("stop succeeds");
        assert_eq!(aborted.expect("request handed back").id, 1);
        assert!(device.is_stopped());
        assert!(device.working_request().is_none());
        assert_eq!(device.outstanding_requests(), 0);
        // No ready notification fires on the way out.
        assert_eq!(
            device.notify().events,
            vec![
                Notification::Ready,
                Notification::NotReady(NotReadyReason::SmpRequestStarted),
                Notification::NotReady(NotReadyReason::StopRequested),
            ]
        );
        assert_invariant(&device);
    }

    #[test]
    fn stop_port_failure_changes_nothing() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");
        device.port.fail_stop = Some(resource_rejected("port busy"));

        let error = device.stop().expect_err("stop fails");
        assert_eq!(error, resource_rejected("port busy"));
        assert!(!device.is_stopped());
        assert_eq!(device.state(), DeviceState::Cmd);
        assert_eq!(device.working_request().map(|r| r.id), Some(1));
        assert_eq!(device.notify().events.len(), 2);

        device.port.fail_stop = None;
        let aborted = device.stop().expect("stop succeeds after retry");
        assert_eq!(aborted.expect("request handed back").id, 1);
    }

    #[test]
    fn default_handlers_reject_in_idle() {
        let mut device = new_device();
        let results = [
            device.start(),
            device.fail(),
            device.destruct(),
            device.reset(),
            device.reset_complete(),
            device.continue_io(),
            device.start_task(),
            device.complete_task(),
            device.suspend(),
            device.resume(),
            device.event(5),
        ];
        for result in results {
            assert_eq!(
                result.expect_err("unsupported in idle").kind(),
                DeviceErrorKind::InvalidState
            );
        }
        assert_eq!(
            device.complete_io().expect_err("nothing to complete").kind(),
            DeviceErrorKind::InvalidState
        );
        assert_eq!(device.state(), DeviceState::Idle);
        assert_eq!(device.notify().events, vec![Notification::Ready]);
    }

    #[test]
    fn default_handlers_reject_in_cmd() {
        let mut device = new_device();
        device.start_io(MockRequest::new(1)).expect("admission succeeds");
        let results = [
            device.start(),
            device.fail(),
            device.destruct(),
            device.reset(),
            device.reset_complete(),
            device.continue_io(),
            device.start_task(),
            device.complete_task(),
            device.suspend(),
            device.resume(),
            device.event(5),
        ];
        for result in results {
            assert_eq!(
                result.expect_err("unsupported in cmd").kind(),
                DeviceErrorKind::InvalidState
            );
        }
        assert_eq!(device.state(), DeviceState::Cmd);
        assert_eq!(device.working_request().map(|r| r.id), Some(1));
        assert_invariant(&device);
    }

    #[test]
    fn invariant_holds_across_full_cycles() {
        let mut device = new_device();
        for id in 1..=3 {
            assert_invariant(&device);
            device.start_io(MockRequest::new(id)).expect("admission succeeds");
            assert_invariant(&device);
            let finished = device.complete_io().expect("completion succeeds");
            assert_eq!(finished.id, id);
            assert_invariant(&device);
        }
        // Three full cycles: three not-ready and four ready notifications.
        let readies = device
            .notify()
            .events
            .iter()
            .filter(|event| matches!(event, Notification::Ready))
            .count();
        assert_eq!(readies, 4);
        assert_eq!(device.notify().events.len(), 7);
    }
}
