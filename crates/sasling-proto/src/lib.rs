#![no_std]

use core::{convert::TryFrom, fmt};

/// Frame type byte carried by every SMP request frame.
pub const SMP_FRAME_REQUEST: u8 = 0x40;
/// Frame type byte carried by every SMP response frame.
pub const SMP_FRAME_RESPONSE: u8 = 0x41;
/// Number of bytes in an encoded SMP frame header.
pub const SMP_HEADER_LEN: usize = 4;

/// Errors surfaced while decoding SMP frame headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtoError {
    /// Buffer length did not match the header length.
    InvalidLength { expected: usize, actual: usize },
    /// Frame type byte did not match the expected header kind.
    InvalidFrameType(u8),
    /// Management function code is unsupported.
    InvalidFunction(u8),
    /// Function result code is unsupported.
    InvalidResult(u8),
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoError::InvalidLength { expected, actual } => {
                write!(f, "invalid header length {actual}, expected {expected}")
            }
            ProtoError::InvalidFrameType(ty) => write!(f, "invalid SMP frame type {ty:#04x}"),
            ProtoError::InvalidFunction(func) => {
                write!(f, "invalid SMP function {func:#04x}")
            }
            ProtoError::InvalidResult(result) => {
                write!(f, "invalid SMP function result {result:#04x}")
            }
        }
    }
}

/// Result alias for header parsing operations.
pub type Result<T> = core::result::Result<T, ProtoError>;

/// Management functions an expander is asked to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SmpFunction {
    ReportGeneral = 0x00,
    ReportManufacturerInfo = 0x01,
    Discover = 0x10,
    ReportPhyErrorLog = 0x11,
    ReportPhySata = 0x12,
    ReportRouteInfo = 0x13,
    ConfigureRouteInfo = 0x90,
    PhyControl = 0x91,
    PhyTestFunction = 0x92,
}

impl TryFrom<u8> for SmpFunction {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::ReportGeneral),
            0x01 => Ok(Self::ReportManufacturerInfo),
            0x10 => Ok(Self::Discover),
            0x11 => Ok(Self::ReportPhyErrorLog),
            0x12 => Ok(Self::ReportPhySata),
            0x13 => Ok(Self::ReportRouteInfo),
            0x90 => Ok(Self::ConfigureRouteInfo),
            0x91 => Ok(Self::PhyControl),
            0x92 => Ok(Self::PhyTestFunction),
            other => Err(ProtoError::InvalidFunction(other)),
        }
    }
}

impl From<SmpFunction> for u8 {
    fn from(func: SmpFunction) -> Self {
        func as u8
    }
}

/// Function results reported in SMP response frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SmpResult {
    Accepted = 0x00,
    UnknownFunction = 0x01,
    FunctionFailed = 0x02,
    InvalidRequestFrameLength = 0x03,
    Busy = 0x05,
    PhyDoesNotExist = 0x10,
    IndexDoesNotExist = 0x11,
    PhyVacant = 0x16,
}

impl TryFrom<u8> for SmpResult {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Accepted),
            0x01 => Ok(Self::UnknownFunction),
            0x02 => Ok(Self::FunctionFailed),
            0x03 => Ok(Self::InvalidRequestFrameLength),
            0x05 => Ok(Self::Busy),
            0x10 => Ok(Self::PhyDoesNotExist),
            0x11 => Ok(Self::IndexDoesNotExist),
            0x16 => Ok(Self::PhyVacant),
            other => Err(ProtoError::InvalidResult(other)),
        }
    }
}

impl From<SmpResult> for u8 {
    fn from(result: SmpResult) -> Self {
        result as u8
    }
}

/// Header of an SMP request frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmpRequestHeader {
    pub function: SmpFunction,
    /// Response space granted to the target, in dwords.
    pub allocated_response_len: u8,
    /// Additional request bytes that follow the header, in dwords.
    pub request_len: u8,
}

impl SmpRequestHeader {
    pub const fn new(function: SmpFunction, allocated_response_len: u8, request_len: u8) -> Self {
        Self {
            function,
            allocated_response_len,
            request_len,
        }
    }

    pub fn encode(self) -> [u8; SMP_HEADER_LEN] {
        [
            SMP_FRAME_REQUEST,
            self.function.into(),
            self.allocated_response_len,
            self.request_len,
        ]
    }

    pub fn decode(bytes: [u8; SMP_HEADER_LEN]) -> Result<Self> {
        if bytes[0] != SMP_FRAME_REQUEST {
            return Err(ProtoError::InvalidFrameType(bytes[0]));
        }
        Ok(Self {
            function: SmpFunction::try_from(bytes[1])?,
            allocated_response_len: bytes[2],
            request_len: bytes[3],
        })
    }
}

impl TryFrom<&[u8]> for SmpRequestHeader {
    type Error = ProtoError;

    fn try_from(value: &[u8]) -> Result<Self> {
        if value.len() != SMP_HEADER_LEN {
            return Err(ProtoError::InvalidLength {
                expected: SMP_HEADER_LEN,
                actual: value.len(),
            });
        }
        let mut buf = [0u8; SMP_HEADER_LEN];
        buf.copy_from_slice(value);
        Self::decode(buf)
    }
}

/// Header of an SMP response frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmpResponseHeader {
    pub function: SmpFunction,
    pub result: SmpResult,
    /// Additional response bytes that follow the header, in dwords.
    pub response_len: u8,
}

impl SmpResponseHeader {
    pub const fn new(function: SmpFunction, result: SmpResult, response_len: u8) -> Self {
        Self {
            function,
            result,
            response_len,
        }
    }

    pub fn encode(self) -> [u8; SMP_HEADER_LEN] {
        [
            SMP_FRAME_RESPONSE,
            self.function.into(),
            self.result.into(),
            self.response_len,
        ]
    }

    pub fn decode(bytes: [u8; SMP_HEADER_LEN]) -> Result<Self> {
        if bytes[0] != SMP_FRAME_RESPONSE {
            return Err(ProtoError::InvalidFrameType(bytes[0]));
        }
        Ok(Self {
            function: SmpFunction::try_from(bytes[1])?,
            result: SmpResult::try_from(bytes[2])?,
            response_len: bytes[3],
        })
    }
}

impl TryFrom<&[u8]> for SmpResponseHeader {
    type Error = ProtoError;

    fn try_from(value: &[u8]) -> Result<Self> {
        if value.len() != SMP_HEADER_LEN {
            return Err(ProtoError::InvalidLength {
                expected: SMP_HEADER_LEN,
                actual: value.len(),
            });
        }
        let mut buf = [0u8; SMP_HEADER_LEN];
        buf.copy_from_slice(value);
        Self::decode(buf)
    }
}
