use crate::device::{invalid_state, DeviceError, DeviceResult, DeviceState, RemoteDevice, StartIoError};
use crate::metrics;
use crate::notify::NotifySink;
use crate::port::RemotePort;
use crate::request::SmpRequest;
use crate::rnc::RemoteNodeContext;
use tracing::{trace, warn};

/// Per-state handler set for every remote-device operation.
///
/// Dispatch is total: every operation has a handler in every sub-state. The
/// defaults reject with an invalid-state status and touch nothing; each state
/// overrides only what it supports. `stop` is deliberately shared, both
/// sub-states route it to the ready-state stop path.
pub(crate) trait ReadyStateHandlers<P, C, N, R>
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    fn start(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "start"))
    }

    fn stop(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<Option<R>> {
        device.ready_state_stop()
    }

    fn fail(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "fail"))
    }

    fn destruct(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "destruct"))
    }

    fn reset(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "reset"))
    }

    fn reset_complete(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "reset_complete"))
    }

    fn start_io(
        &self,
        device: &mut RemoteDevice<P, C, N, R>,
        request: R,
    ) -> Result<(), StartIoError<R>> {
        metrics::observe_io_rejected();
        Err(StartIoError {
            request,
            error: rejected(device, "start_io"),
        })
    }

    fn complete_io(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<R> {
        Err(rejected(device, "complete_io"))
    }

    fn continue_io(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "continue_io"))
    }

    fn start_task(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "start_task"))
    }

    fn complete_task(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "complete_task"))
    }

    fn suspend(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "suspend"))
    }

    fn resume(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<()> {
        Err(rejected(device, "resume"))
    }

    fn event(&self, device: &mut RemoteDevice<P, C, N, R>, event_code: u32) -> DeviceResult<()> {
        warn!(device = %device.address(), event_code, "unexpected event");
        Err(invalid_state("event"))
    }

    fn frame(&self, device: &mut RemoteDevice<P, C, N, R>, frame_index: u32) -> DeviceResult<()> {
        device.default_frame_handler(frame_index)
    }
}

/// Select the active handler set for a sub-state.
pub(crate) fn handler_table<P, C, N, R>(
    state: DeviceState,
) -> &'static dyn ReadyStateHandlers<P, C, N, R>
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    match state {
        DeviceState::Idle => &IdleHandlers,
        DeviceState::Cmd => &CmdHandlers,
    }
}

pub(crate) struct IdleHandlers;

pub(crate) struct CmdHandlers;

impl<P, C, N, R> ReadyStateHandlers<P, C, N, R> for IdleHandlers
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    fn start_io(
        &self,
        device: &mut RemoteDevice<P, C, N, R>,
        mut request: R,
    ) -> Result<(), StartIoError<R>> {
        let address = device.address();

        // Admission chain: port gate, hardware context, then the request
        // itself. A failure anywhere skips every later step and leaves the
        // device untouched.
        if let Err(error) = device.port.start_io(address, &request) {
            metrics::observe_io_rejected();
            return Err(StartIoError { request, error });
        }
        if let Err(error) = device.rnc.start_io(address, &request) {
            metrics::observe_io_rejected();
            return Err(StartIoError { request, error });
        }
        if let Err(error) = request.start() {
            metrics::observe_io_rejected();
            return Err(StartIoError { request, error });
        }

        trace!(device = %address, function = ?request.function(), "smp request queued");
        if let Err(request) = device.requests.install(request) {
            // Unreachable while the invariant holds; surface rather than
            // overwrite.
            return Err(StartIoError {
                request,
                error: invalid_state("start_io"),
            });
        }
        metrics::observe_io_started();
        device.transition(DeviceState::Cmd);
        Ok(())
    }
}

impl<P, C, N, R> ReadyStateHandlers<P, C, N, R> for CmdHandlers
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    fn complete_io(&self, device: &mut RemoteDevice<P, C, N, R>) -> DeviceResult<R> {
        let address = device.address();
        let mut request = match device.requests.take() {
            Some(request) => request,
            None => return Err(invalid_state("complete_io")),
        };

        // Request bookkeeping first, then port accounting. A failure of
        // either leaves the working request in place; the hardware already
        // finished, so the slot must not be silently re-admitted.
        if let Err(error) = request.complete() {
            device.requests.restore(request);
            return Err(error);
        }
        if let Err(error) = device.port.complete_io(address, &request) {
            device.requests.restore(request);
            return Err(error);
        }

        device.requests.retire();
        metrics::observe_io_completed();
        device.transition(DeviceState::Idle);
        Ok(request)
    }

    fn frame(&self, device: &mut RemoteDevice<P, C, N, R>, frame_index: u32) -> DeviceResult<()> {
        let address = device.address();
        match device.requests.working_mut() {
            Some(request) => {
                trace!(
                    device = %address,
                    function = ?request.function(),
                    frame_index,
                    "unsolicited frame routed to working request"
                );
                metrics::observe_frame_routed();
                request.frame_handler(frame_index)
            }
            None => Err(invalid_state("frame")),
        }
    }
}

fn rejected<P, C, N, R>(
    device: &RemoteDevice<P, C, N, R>,
    operation: &'static str,
) -> DeviceError
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    warn!(
        device = %device.address(),
        operation,
        state = ?device.state(),
        "operation not permitted in current state"
    );
    invalid_state(operation)
}
