use crate::device::{DeviceResult, SasAddress};
use crate::request::SmpRequest;

/// Admission gate owned by the port a remote device was discovered through.
///
/// The device borrows the port and never destroys it. Statuses returned here
/// are handed to the device's caller unchanged.
pub trait RemotePort {
    /// Ask the port to admit a new I/O for `device`.
    ///
    /// A port that is resetting or otherwise not ready declines here, before
    /// any hardware resource is touched.
    fn start_io<R: SmpRequest>(&mut self, device: SasAddress, request: &R) -> DeviceResult<()>;

    /// Account a finished I/O for `device`.
    fn complete_io<R: SmpRequest>(&mut self, device: SasAddress, request: &R) -> DeviceResult<()>;

    /// Shared stop path for devices leaving the ready state.
    fn stop_handler(&mut self, device: SasAddress) -> DeviceResult<()>;
}
