use crate::device::{DeviceResult, SasAddress};
use crate::request::SmpRequest;

/// The hardware's per-device context slot.
///
/// Each remote device exclusively owns one context. The device asks the
/// context to admit I/O before a request is handed to the hardware queue;
/// rejection statuses (context not yet established, resource exhaustion)
/// propagate to the caller unchanged.
pub trait RemoteNodeContext {
    /// Admit a new I/O into the device's hardware context.
    fn start_io<R: SmpRequest>(&mut self, device: SasAddress, request: &R) -> DeviceResult<()>;
}
