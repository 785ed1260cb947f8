//! Wire codec for the framed request/response protocol spoken over TCP.
//!
//! Every message starts with a fixed 7-byte header: message type, a 16-bit
//! sequence id, a segmentation status, the SQI reply status reported by the
//! communication chip, and the payload size. All multi-byte fields are
//! little-endian.

use int_enum::IntEnum;
use snafu::Snafu;

/// Size of the fixed message header, in bytes.
pub const HEADER_LEN: usize = 7;
/// Largest frame (header plus payload) the drive will accept or emit.
pub const MAX_FRAME_LEN: usize = 1500;
/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Message types defined by the Ethernet interface definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum MessageType {
    /// Read a Service Data Object (SDO) value
    SdoRead = 0x01,
    /// Write a value to a Service Data Object (SDO)
    SdoWrite = 0x02,
    /// Transmit or receive a Process Data Object (PDO) frame
    PdoRxTxFrame = 0x03,
    /// Control or configure PDO behavior
    PdoControl = 0x04,
    /// Map PDO entries or configurations
    PdoMap = 0x05,
    /// Perform a firmware update operation
    FirmwareUpdate = 0x0B,
    /// Read a file from the device
    FileRead = 0x0C,
    /// Write a file to the device
    FileWrite = 0x0D,
    /// Control the state of the device (INIT, PREOP, ...)
    StateControl = 0x0E,
    /// Read the current state of the device
    StateRead = 0x0F,
    /// Request the full list of parameter descriptors
    ParamFullList = 0x13,
    /// Request information about the server
    ServerInfo = 0x20,
}

/// Segmentation status carried by every frame
///
/// A logical payload larger than one frame is delivered as a
/// `First (Middle*)? Last` sequence; a payload fitting in one frame uses
/// `Ok`. `Err` terminates the exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum FrameStatus {
    /// Complete single-frame message
    Ok = 0x00,
    /// First segment of a multi-part message
    First = 0x80,
    /// Middle segment of a multi-part message
    Middle = 0xC0,
    /// Last segment of a multi-part message
    Last = 0x40,
    /// The message failed validation on the device
    Err = 0x28,
}

/// Outcome of the SQI exchange between the communication chip and the SoC
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum SqiReplyStatus {
    /// No SQI activity reported (the value carried by requests)
    Idle = 0x00,
    /// Device is busy and cannot process the request right now
    Bsy = 0x28,
    /// Request was accepted
    Ack = 0x58,
    /// The SoC failed to process the request
    Err = 0x63,
}

/// Application-layer states of the EtherCAT state machine, as carried in
/// STATE_READ / STATE_CONTROL payloads
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum EcatState {
    /// Initialisation
    Init = 1,
    /// Pre-operational
    PreOp = 2,
    /// Bootstrap (firmware update side state)
    Boot = 3,
    /// Safe-operational
    SafeOp = 4,
    /// Operational
    Op = 8,
}

/// Error returned when a raw buffer cannot be parsed as a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum FrameError {
    /// The buffer ended before the 7-byte header
    #[snafu(display("buffer of {len} bytes is too short for a frame header"))]
    HeaderTooShort {
        /// Number of bytes actually available
        len: usize,
    },
    /// The declared payload size disagrees with the buffer length
    #[snafu(display("frame declares {declared} payload bytes but buffer carries {actual}"))]
    SizeMismatch {
        /// Payload size from the header
        declared: usize,
        /// Bytes present after the header
        actual: usize,
    },
    /// The declared payload size exceeds what fits in one frame
    #[snafu(display("declared payload of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit"))]
    PayloadTooLarge {
        /// Payload size from the header
        len: usize,
    },
    /// The message type byte is not in the catalog
    #[snafu(display("unknown message type {value:#04x}"))]
    InvalidMessageType {
        /// Raw type byte
        value: u8,
    },
    /// The status byte is not a known segmentation status
    #[snafu(display("unknown frame status {value:#04x}"))]
    InvalidStatus {
        /// Raw status byte
        value: u8,
    },
    /// The SQI reply byte is not a known reply status
    #[snafu(display("unknown SQI reply status {value:#04x}"))]
    InvalidSqiStatus {
        /// Raw SQI byte
        value: u8,
    },
}

/// One message on the wire: the parsed header fields plus the raw payload
///
/// The payload is carried without interpretation; the layer above decides
/// what the bytes mean based on the message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    /// What kind of operation this frame belongs to
    pub message_type: MessageType,
    /// Sequence id; echoed verbatim by a conforming device
    pub id: u16,
    /// Segmentation status
    pub status: FrameStatus,
    /// SQI reply status; `Idle` on requests
    pub sqi_status: SqiReplyStatus,
    /// Raw payload, not counting the header
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Build a single-frame request with status [`FrameStatus::Ok`]
    pub fn request(message_type: MessageType, id: u16, payload: Vec<u8>) -> Self {
        Self::request_with_status(message_type, id, FrameStatus::Ok, payload)
    }

    /// Build a request frame carrying an explicit segmentation status
    pub fn request_with_status(
        message_type: MessageType,
        id: u16,
        status: FrameStatus,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            message_type,
            id,
            status,
            sqi_status: SqiReplyStatus::Idle,
            payload,
        }
    }

    /// Serialize the frame into transmission order: 7-byte header followed by
    /// the payload, passed through unmodified
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buffer.push(self.message_type as u8);
        buffer.extend_from_slice(&self.id.to_le_bytes());
        buffer.push(self.status as u8);
        buffer.push(self.sqi_status as u8);
        buffer.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buffer.extend_from_slice(&self.payload);
        buffer
    }

    /// Parse a raw buffer holding exactly one frame
    ///
    /// The buffer must contain exactly `7 + size` bytes for a declared
    /// payload size of `size`; trailing bytes indicate a framing error.
    pub fn parse(buffer: &[u8]) -> Result<Self, FrameError> {
        if buffer.len() < HEADER_LEN {
            return Err(FrameError::HeaderTooShort { len: buffer.len() });
        }
        let message_type = MessageType::try_from(buffer[0])
            .map_err(|_| FrameError::InvalidMessageType { value: buffer[0] })?;
        let id = u16::from_le_bytes([buffer[1], buffer[2]]);
        let status = FrameStatus::try_from(buffer[3])
            .map_err(|_| FrameError::InvalidStatus { value: buffer[3] })?;
        let sqi_status = SqiReplyStatus::try_from(buffer[4])
            .map_err(|_| FrameError::InvalidSqiStatus { value: buffer[4] })?;
        let size = u16::from_le_bytes([buffer[5], buffer[6]]) as usize;
        if size > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge { len: size });
        }
        if buffer.len() != HEADER_LEN + size {
            return Err(FrameError::SizeMismatch {
                declared: size,
                actual: buffer.len() - HEADER_LEN,
            });
        }
        Ok(Self {
            message_type,
            id,
            status,
            sqi_status,
            payload: buffer[HEADER_LEN..].to_vec(),
        })
    }
}
