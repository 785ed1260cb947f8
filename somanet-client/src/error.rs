//! The error type shared by all device operations.

use std::time::Duration;

use snafu::Snafu;
use somanet_common::frame::FrameError;
use somanet_common::objects::param_id;
use somanet_common::paramlist::ParamListError;
use somanet_common::pdo::PdoError;
use somanet_common::value::ValueError;

/// Anything that can go wrong while talking to a drive
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeviceError {
    /// Socket connect, read or write failed
    #[snafu(display("socket error: {source}"))]
    Io {
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The per-operation deadline elapsed
    ///
    /// The socket may be left half-drained; the session should be closed and
    /// reopened before the next operation.
    #[snafu(display("operation timed out after {deadline:?}"))]
    Timeout {
        /// The deadline that was exceeded
        deadline: Duration,
    },
    /// A response frame could not be parsed
    #[snafu(display("malformed frame: {source}"))]
    Frame {
        /// The underlying codec error
        source: FrameError,
    },
    /// The exchange violated the protocol (bad segment sequence, unexpected
    /// reply shape, oversized reassembly)
    #[snafu(display("protocol error: {message}"))]
    Protocol {
        /// What went wrong
        message: &'static str,
    },
    /// The device is busy; the caller may retry the operation
    #[snafu(display("device busy"))]
    DeviceBusy,
    /// The device reported a failure for this exchange
    #[snafu(display("device reported an error (status {status:#04x}, sqi {sqi:#04x})"))]
    DeviceFault {
        /// Raw frame status byte of the failing reply
        status: u8,
        /// Raw SQI reply byte of the failing reply
        sqi: u8,
    },
    /// A value could not be decoded or encoded
    #[snafu(display("{source}"))]
    Value {
        /// The underlying codec error
        source: ValueError,
    },
    /// The parameter list payload could not be parsed
    #[snafu(display("parameter list: {source}"))]
    ParameterList {
        /// The underlying parse error
        source: ParamListError,
    },
    /// A download was attempted with an empty data buffer
    #[snafu(display("download of {id} attempted with no data", id = param_id(*index, *subindex)))]
    EmptyPayload {
        /// Index of the parameter
        index: u16,
        /// Subindex of the parameter
        subindex: u8,
    },
    /// The addressed parameter is not in the local store
    #[snafu(display("no parameter {id} in the store", id = param_id(*index, *subindex)))]
    ParameterUnknown {
        /// Index of the parameter
        index: u16,
        /// Subindex of the parameter
        subindex: u8,
    },
    /// Process data packing or unpacking failed
    #[snafu(display("process data: {source}"))]
    Pdo {
        /// The underlying engine error
        source: PdoError,
    },
    /// The session is not connected
    #[snafu(display("not connected"))]
    NotConnected,
}

impl DeviceError {
    /// Returns true for errors after which the socket state is indeterminate
    /// and the session should be reconnected before the next operation
    pub fn poisons_connection(&self) -> bool {
        matches!(self, DeviceError::Io { .. } | DeviceError::Timeout { .. })
    }
}

/// Convenient result alias for device operations
pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
