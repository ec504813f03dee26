pub mod device;
pub mod frame;
mod handlers;
pub mod metrics;
pub mod notify;
pub mod port;
pub mod request;
pub mod rnc;

pub use device::{
    DeviceError, DeviceErrorKind, DeviceResult, DeviceState, RemoteDevice, SasAddress,
    StartIoError,
};
pub use frame::route_frame;
pub use notify::{NotReadyReason, NotifySink};
pub use port::RemotePort;
pub use request::SmpRequest;
pub use rnc::RemoteNodeContext;
