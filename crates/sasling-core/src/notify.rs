use crate::device::SasAddress;

/// Why a device stopped accepting new work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotReadyReason {
    /// An SMP request occupies the device exclusively.
    SmpRequestStarted,
    /// The device is being stopped and will not return to service.
    StopRequested,
}

/// Upstream readiness signal consumed by a higher driver layer.
///
/// A transport class uses these callbacks to decide whether new commands may
/// be queued to the device. Exactly one not-ready fires per Idle to Cmd
/// transition and exactly one ready per Cmd to Idle transition; rejected or
/// failed operations fire nothing.
pub trait NotifySink {
    fn device_ready(&mut self, device: SasAddress);

    fn device_not_ready(&mut self, device: SasAddress, reason: NotReadyReason);
}
