use crate::device::{DeviceResult, RemoteDevice};
use crate::notify::NotifySink;
use crate::port::RemotePort;
use crate::request::SmpRequest;
use crate::rnc::RemoteNodeContext;
use tracing::trace;

/// Forward a hardware-delivered unsolicited frame to whichever request
/// currently owns `device`.
///
/// Frames are handled strictly in delivery order, synchronously in the
/// calling context. In Cmd the working request's frame handler runs and its
/// status passes through unchanged; in Idle the device's default policy
/// applies (the frame has no owner, which the surrounding driver treats as a
/// protocol or ordering error).
pub fn route_frame<P, C, N, R>(
    device: &mut RemoteDevice<P, C, N, R>,
    frame_index: u32,
) -> DeviceResult<()>
where
    P: RemotePort + 'static,
    C: RemoteNodeContext + 'static,
    N: NotifySink + 'static,
    R: SmpRequest + 'static,
{
    trace!(device = %device.address(), frame_index, "unsolicited frame received");
    device.frame(frame_index)
}
