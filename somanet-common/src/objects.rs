//! The object dictionary model: parameters and their metadata.

use core::cmp::Ordering;
use core::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::value::{self, ObjectDataType, ParameterValue, ValueError};

/// Identity of one object dictionary entry: (index, subindex)
pub type ParameterKey = (u16, u8);

/// Error returned when a raw byte is not a valid object code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("unknown object code {value:#04x}"))]
pub struct InvalidObjectCode {
    /// The offending raw byte
    pub value: u8,
}

/// The kind of entry an object dictionary slot holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ObjectCode {
    /// Definition type object
    DefType = 0x05,
    /// Definition structure object
    DefStruct = 0x06,
    /// Variable object
    #[default]
    Var = 0x07,
    /// Array object
    Array = 0x08,
    /// Record object
    Record = 0x09,
}

impl TryFrom<u8> for ObjectCode {
    type Error = InvalidObjectCode;

    fn try_from(value: u8) -> Result<Self, InvalidObjectCode> {
        match value {
            0x05 => Ok(ObjectCode::DefType),
            0x06 => Ok(ObjectCode::DefStruct),
            0x07 => Ok(ObjectCode::Var),
            0x08 => Ok(ObjectCode::Array),
            0x09 => Ok(ObjectCode::Record),
            _ => Err(InvalidObjectCode { value }),
        }
    }
}

impl From<ObjectCode> for u8 {
    fn from(code: ObjectCode) -> u8 {
        code as u8
    }
}

/// Per-state access, PDO mapping eligibility and backup/startup markers of an
/// object dictionary entry, packed as the drive reports them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectFlags(u16);

#[allow(missing_docs)]
impl ObjectFlags {
    pub const NONE: ObjectFlags = ObjectFlags(0x0000);

    // Read access per state
    pub const PO_RD: ObjectFlags = ObjectFlags(0x0001);
    pub const SO_RD: ObjectFlags = ObjectFlags(0x0002);
    pub const OP_RD: ObjectFlags = ObjectFlags(0x0004);
    pub const ALL_RD: ObjectFlags = ObjectFlags(0x0007);

    // Write access per state
    pub const PO_WR: ObjectFlags = ObjectFlags(0x0008);
    pub const SO_WR: ObjectFlags = ObjectFlags(0x0010);
    pub const OP_WR: ObjectFlags = ObjectFlags(0x0020);
    pub const ALL_WR: ObjectFlags = ObjectFlags(0x0038);
    pub const ALL_RDWR: ObjectFlags = ObjectFlags(0x003F);

    // Mapping eligibility
    pub const RXPDO_MAP: ObjectFlags = ObjectFlags(0x0040);
    pub const TXPDO_MAP: ObjectFlags = ObjectFlags(0x0080);

    // Other markers
    pub const BACKUP: ObjectFlags = ObjectFlags(0x0100);
    pub const STARTUP: ObjectFlags = ObjectFlags(0x0200);
}

impl ObjectFlags {
    /// Reconstruct flags from the raw bitfield as found on the wire
    pub const fn from_bits(bits: u16) -> Self {
        ObjectFlags(bits)
    }

    /// The raw bitfield
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true if every flag in `other` is set in `self`
    pub const fn contains(self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ObjectFlags {
    fn bitor_assign(&mut self, rhs: ObjectFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ObjectFlags {
    type Output = ObjectFlags;

    fn bitand(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 & rhs.0)
    }
}

/// Format an (index, subindex) pair the way it appears in drive tooling,
/// e.g. `0x1018:02`
pub fn param_id(index: u16, subindex: u8) -> String {
    format!("{index:#06X}:{subindex:02X}")
}

/// One object dictionary entry: identity, metadata and the current raw value
///
/// The raw `data` buffer is the source of truth for the value; SDO downloads
/// and PDO packing both read it directly, and [`Parameter::value`] decodes it
/// on demand. There is deliberately no cached decoded form.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// 16-bit object dictionary index
    pub index: u16,
    /// 8-bit subindex
    pub subindex: u8,
    /// Human readable name reported by the drive
    pub name: String,
    /// Size of the entry in bits
    pub bit_length: u16,
    /// Data type tag governing the value codec
    pub data_type: ObjectDataType,
    /// The kind of object this entry belongs to
    pub code: ObjectCode,
    /// Mapping eligibility and backup/startup markers
    pub flags: ObjectFlags,
    /// Per-state read/write access
    pub access: ObjectFlags,
    /// Current raw value, little-endian
    #[serde(default)]
    pub data: Vec<u8>,
}

impl Parameter {
    /// Size of the entry in whole bytes (at least one)
    pub fn byte_length(&self) -> usize {
        usize::max((self.bit_length as usize).div_ceil(8), 1)
    }

    /// The (index, subindex) identity
    pub fn key(&self) -> ParameterKey {
        (self.index, self.subindex)
    }

    /// Decode the current raw data into a typed value
    pub fn value(&self) -> Result<ParameterValue, ValueError> {
        value::decode(self.data_type, &self.data)
    }

    /// Re-encode `value` into the raw data buffer
    pub fn set_value(&mut self, value: &ParameterValue) -> Result<(), ValueError> {
        self.data = value::encode(self.data_type, value)?;
        Ok(())
    }

    /// `0xIIII:SS` form of the identity, for log and error messages
    pub fn id(&self) -> String {
        param_id(self.index, self.subindex)
    }
}

// Equality and ordering consider the identity only, so parameters sort the
// same way the drive reports them regardless of their current value.
impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Parameter {}

impl PartialOrd for Parameter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Parameter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
