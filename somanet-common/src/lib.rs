//! Common functionality shared by SOMANET Ethernet client crates.
//!
//! This crate holds everything that can be exercised without a socket: the
//! wire codec for the framed TCP protocol spoken by the drives, the object
//! dictionary model (parameters, data types, flags), the byte-level value
//! codec, the process-data pack/unpack engine and the JSON PDO-mapping
//! configuration. The I/O layer lives in `somanet-client`, which re-exports
//! this crate.
#![warn(missing_docs, missing_copy_implementations)]

pub mod constants;
pub mod device_config;
pub mod frame;
pub mod objects;
pub mod paramlist;
pub mod pdo;
pub mod store;
pub mod value;

pub use frame::{EcatState, EthernetFrame, FrameError, FrameStatus, MessageType, SqiReplyStatus};
pub use objects::{param_id, ObjectCode, ObjectFlags, Parameter, ParameterKey};
pub use pdo::{PdoError, PdoMappingEntry, PdoMappings};
pub use store::ParameterStore;
pub use value::{ObjectDataType, ParameterValue, ValueError};
