//! Parsing of the descriptor stream returned by a full parameter list
//! request.
//!
//! The reassembled payload is a concatenation of variable-length descriptor
//! records, one per object dictionary entry. All integers are little-endian:
//!
//! ```text
//! u16 index | u8 subindex | u8 object code | u16 data type | u16 bit length
//! | u16 object flags | u16 access flags | u8 name length | name (UTF-8)
//! | [ u16 value length | value bytes ]
//! ```
//!
//! The trailing value block is present only when the request asked the drive
//! to include current values.

use snafu::Snafu;

use crate::objects::{InvalidObjectCode, ObjectFlags, Parameter};
use crate::value::{ObjectDataType, ValueError};

/// Errors produced while walking a descriptor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum ParamListError {
    /// The stream ended in the middle of a record
    #[snafu(display("descriptor record truncated at offset {offset}"))]
    Truncated {
        /// Byte offset where the record started
        offset: usize,
    },
    /// A record carries a data type identifier the codec does not know
    #[snafu(display("descriptor at offset {offset}: {source}"))]
    BadDataType {
        /// Byte offset where the record started
        offset: usize,
        /// The underlying codec error
        source: ValueError,
    },
    /// A record carries an unknown object code
    #[snafu(display("descriptor at offset {offset}: {source}"))]
    BadObjectCode {
        /// Byte offset where the record started
        offset: usize,
        /// The underlying conversion error
        source: InvalidObjectCode,
    },
    /// A record's name bytes are not valid UTF-8
    #[snafu(display("descriptor name at offset {offset} is not valid UTF-8"))]
    BadName {
        /// Byte offset where the record started
        offset: usize,
    },
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    record_start: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, record_start: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParamListError> {
        if self.remaining() < len {
            return Err(ParamListError::Truncated { offset: self.record_start });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, ParamListError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, ParamListError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

/// Parse a reassembled parameter list payload into descriptors
///
/// `read_values` must match the flag sent with the request: it decides
/// whether each record carries a trailing value block. Parameters come back
/// in stream order; the caller inserts them into a store, which resolves
/// duplicate identities by overwriting.
pub fn parse_parameter_list(
    data: &[u8],
    read_values: bool,
) -> Result<Vec<Parameter>, ParamListError> {
    let mut reader = Reader::new(data);
    let mut parameters = Vec::new();

    while reader.remaining() > 0 {
        reader.record_start = reader.pos;
        let offset = reader.record_start;

        let index = reader.take_u16()?;
        let subindex = reader.take_u8()?;
        let code = reader
            .take_u8()?
            .try_into()
            .map_err(|source| ParamListError::BadObjectCode { offset, source })?;
        let data_type = ObjectDataType::try_from(reader.take_u16()?)
            .map_err(|source| ParamListError::BadDataType { offset, source })?;
        let bit_length = reader.take_u16()?;
        let flags = ObjectFlags::from_bits(reader.take_u16()?);
        let access = ObjectFlags::from_bits(reader.take_u16()?);

        let name_len = reader.take_u8()? as usize;
        let name = core::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| ParamListError::BadName { offset })?
            .to_owned();

        let value = if read_values {
            let value_len = reader.take_u16()? as usize;
            reader.take(value_len)?.to_vec()
        } else {
            Vec::new()
        };

        parameters.push(Parameter {
            index,
            subindex,
            name,
            bit_length,
            data_type,
            code,
            flags,
            access,
            data: value,
        });
    }

    Ok(parameters)
}
