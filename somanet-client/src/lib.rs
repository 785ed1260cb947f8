//! A client for SOMANET servo drives speaking the framed Ethernet protocol.
//!
//! The crate provides a single-connection TCP session per drive:
//!
//! - [`EthernetDevice`], the session object carrying the whole capability
//!   set: connect/disconnect, EtherCAT state control, SDO upload/download,
//!   full parameter list retrieval, file transfer (including firmware
//!   images and the filesystem listing/removal pseudo files), and cyclic
//!   process data exchange driven by a configured PDO mapping.
//! - [`DeviceError`], the error taxonomy shared by every operation.
//!
//! All data-plane types (frames, parameters, values, PDO mappings, the JSON
//! mapping configuration) live in [`somanet_common`], re-exported here as
//! [`common`].
//!
//! ```no_run
//! use std::time::Duration;
//! use somanet_client::{common::frame::EcatState, EthernetDevice};
//!
//! # async fn run() -> somanet_client::Result<()> {
//! let mut drive = EthernetDevice::new("192.168.100.5", 8080);
//! drive.connect().await?;
//! drive.set_state(EcatState::Op, Duration::from_secs(3)).await?;
//! drive.load_parameters(true, Duration::from_secs(9)).await?;
//! let product_code = drive
//!     .upload_value(0x1018, 0x02, Duration::from_secs(1))
//!     .await?;
//! println!("product code: {product_code}");
//! drive.disconnect().await;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs, missing_debug_implementations)]

mod device;
mod error;
mod segmented;
mod transport;

pub use somanet_common as common;

pub use device::EthernetDevice;
pub use error::{DeviceError, Result};
