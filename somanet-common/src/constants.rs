//! Constants defining protocol limits, well-known objects and special values.

/// EtherCAT vendor ids of known drive manufacturers
pub mod vendor_ids {
    /// Vendor id of Synapticon GmbH, the maker of SOMANET drives
    pub const SYNAPTICON: u32 = 0x0000_22D2;
}

/// Object indices for standard objects
pub mod object_ids {
    /// The Device Name object index
    pub const DEVICE_NAME: u16 = 0x1008;
    /// The software version object index
    pub const SOFTWARE_VERSION: u16 = 0x100A;
    /// The identity object index (vendor id, product code, revision, serial)
    pub const IDENTITY: u16 = 0x1018;
}

/// Special file names and reply markers used by the drive's filesystem service
pub mod fs {
    /// Pseudo file name which returns a newline-delimited filesystem listing
    pub const GETLIST: &str = "fs-getlist";
    /// Prefix prepended to a file name to request its removal
    pub const REMOVE_PREFIX: &str = "fs-remove=";
    /// Leading bytes of a successful removal reply
    pub const REMOVE_SUCCESS_PREFIX: &str = "OK";
    /// Suffix separator appended to listing lines when sizes are reported
    pub const SIZE_SUFFIX: &str = ", size: ";
}

/// Default per-operation deadlines, matching the drive firmware's expectations
pub mod deadlines {
    use std::time::Duration;

    /// State read/write round trip
    pub const STATE: Duration = Duration::from_millis(3000);
    /// Single SDO upload or download
    pub const SDO: Duration = Duration::from_millis(1000);
    /// File read or write, per call
    pub const FILE: Duration = Duration::from_millis(5000);
    /// Filesystem listing and removal
    pub const FILE_LIST: Duration = Duration::from_millis(3000);
    /// Full parameter list retrieval
    pub const PARAMETER_LIST: Duration = Duration::from_millis(9000);
    /// Firmware update trigger
    pub const FIRMWARE: Duration = Duration::from_millis(2000);
    /// One process data exchange
    pub const PROCESS_DATA: Duration = Duration::from_millis(1000);
}
