//! Process data packing and unpacking.
//!
//! A PDO mapping is an ordered list of 32-bit mapping words, each encoding
//! `(index << 16) | (subindex << 8) | bit_length`. Packing walks the RxPDO
//! entries and concatenates the mapped parameters' raw data; unpacking walks
//! the TxPDO entries and distributes a received frame back into the store.
//! Entries are byte-granular on the wire: each one occupies
//! `ceil(bit_length / 8)` bytes.

use snafu::Snafu;

use crate::objects::param_id;
use crate::store::ParameterStore;

/// One mapped object within a PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PdoMappingEntry {
    /// The PDO object this entry belongs to (e.g. 0x1600 or 0x1A00)
    pub pdo_index: u16,
    /// The mapped object dictionary index
    pub index: u16,
    /// The mapped subindex
    pub subindex: u8,
    /// The size of the mapped entry in bits
    pub bit_length: u8,
}

impl PdoMappingEntry {
    /// Decode a 32-bit mapping word
    pub fn from_word(pdo_index: u16, word: u32) -> Self {
        Self {
            pdo_index,
            index: (word >> 16) as u16,
            subindex: ((word >> 8) & 0xFF) as u8,
            bit_length: (word & 0xFF) as u8,
        }
    }

    /// Re-encode the entry as a 32-bit mapping word
    pub fn to_word(&self) -> u32 {
        ((self.index as u32) << 16) | ((self.subindex as u32) << 8) | self.bit_length as u32
    }

    /// Bytes this entry occupies in a process data frame
    pub fn byte_length(&self) -> usize {
        (self.bit_length as usize).div_ceil(8)
    }
}

/// The flattened RxPDO and TxPDO mappings of one device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PdoMappings {
    /// Entries received by the drive (master to slave), in frame order
    pub rx: Vec<PdoMappingEntry>,
    /// Entries transmitted by the drive (slave to master), in frame order
    pub tx: Vec<PdoMappingEntry>,
}

impl PdoMappings {
    /// Total RxPDO frame size in bytes
    pub fn rx_frame_len(&self) -> usize {
        self.rx.iter().map(PdoMappingEntry::byte_length).sum()
    }

    /// Total TxPDO frame size in bytes
    pub fn tx_frame_len(&self) -> usize {
        self.tx.iter().map(PdoMappingEntry::byte_length).sum()
    }
}

/// Errors produced by the pack/unpack engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum PdoError {
    /// A mapping entry points at a parameter the store does not hold
    #[snafu(display("no parameter {id} in the store", id = param_id(*index, *subindex)))]
    ParameterUnknown {
        /// Mapped index
        index: u16,
        /// Mapped subindex
        subindex: u8,
    },
    /// The received frame ended before all TxPDO entries were served
    ///
    /// Entries before the break have already been committed to the store.
    #[snafu(display(
        "process data frame ends inside {id}; {committed} bytes committed",
        id = param_id(*index, *subindex)
    ))]
    TruncatedPdo {
        /// First entry that could not be served
        index: u16,
        /// Subindex of that entry
        subindex: u8,
        /// Bytes of the frame consumed before the break
        committed: usize,
    },
}

/// Assemble the outbound RxPDO frame from the current parameter values
///
/// For each mapped entry the first `byte_length` bytes of the parameter's
/// raw data are appended; a parameter whose buffer is shorter than the
/// mapped width is padded with zeros so later entries keep their offsets.
pub fn pack_rx(mappings: &PdoMappings, store: &ParameterStore) -> Result<Vec<u8>, PdoError> {
    let mut frame = Vec::with_capacity(mappings.rx_frame_len());
    for entry in &mappings.rx {
        let parameter = store.find(entry.index, entry.subindex).ok_or(
            PdoError::ParameterUnknown {
                index: entry.index,
                subindex: entry.subindex,
            },
        )?;
        let len = entry.byte_length();
        let available = parameter.data.len().min(len);
        frame.extend_from_slice(&parameter.data[..available]);
        frame.resize(frame.len() + len - available, 0);
    }
    Ok(frame)
}

/// Distribute a received TxPDO frame into the mapped parameters
///
/// Walks the TxPDO entries in order, writing `byte_length` bytes into each
/// mapped parameter's raw data. A frame shorter than the mapping aborts the
/// walk with [`PdoError::TruncatedPdo`], keeping the updates already made.
/// On success the number of unconsumed trailing bytes is returned so the
/// caller can surface them as a warning.
pub fn unpack_tx(
    mappings: &PdoMappings,
    store: &mut ParameterStore,
    frame: &[u8],
) -> Result<usize, PdoError> {
    let mut offset = 0;
    for entry in &mappings.tx {
        let len = entry.byte_length();
        if offset + len > frame.len() {
            return Err(PdoError::TruncatedPdo {
                index: entry.index,
                subindex: entry.subindex,
                committed: offset,
            });
        }
        let parameter = store.find_mut(entry.index, entry.subindex).ok_or(
            PdoError::ParameterUnknown {
                index: entry.index,
                subindex: entry.subindex,
            },
        )?;
        parameter.data = frame[offset..offset + len].to_vec();
        offset += len;
    }
    Ok(frame.len() - offset)
}
