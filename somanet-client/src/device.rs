//! The device session: one TCP connection to one drive, plus the local
//! parameter store and PDO mapping that belong to it.

use std::time::Duration;

use snafu::{OptionExt, ResultExt};

use somanet_common::constants::fs;
use somanet_common::frame::{EcatState, MessageType, MAX_PAYLOAD_LEN};
use somanet_common::objects::Parameter;
use somanet_common::paramlist::parse_parameter_list;
use somanet_common::pdo::{pack_rx, unpack_tx, PdoMappings};
use somanet_common::store::ParameterStore;
use somanet_common::value::ParameterValue;

use crate::error::{
    EmptyPayloadSnafu, NotConnectedSnafu, ParameterListSnafu, ParameterUnknownSnafu, PdoSnafu,
    ProtocolSnafu, Result, ValueSnafu,
};
use crate::segmented::{request_ack, request_segmented, send_segmented};
use crate::transport::{SeqIdAllocator, Transport};

/// The 3-byte object address prefix carried by SDO requests
fn sdo_address(index: u16, subindex: u8) -> Vec<u8> {
    vec![(index & 0xFF) as u8, (index >> 8) as u8, subindex]
}

/// A session with one SOMANET drive reachable over TCP
///
/// The session exclusively owns its socket, its parameter store and its PDO
/// mapping; nothing is shared between sessions. All remote operations take a
/// per-call deadline bounding the whole exchange, segmented or not. Exactly
/// one request/response pair is in flight at a time; concurrent callers
/// serialize on the transport lock.
///
/// A failed exchange does not change the session state. After a timeout the
/// socket is indeterminate
/// ([`poisons_connection`](crate::DeviceError::poisons_connection)) and the
/// caller should [`disconnect`](Self::disconnect) and
/// [`connect`](Self::connect) again.
#[derive(Debug)]
pub struct EthernetDevice {
    host: String,
    port: u16,
    transport: Option<Transport>,
    ids: SeqIdAllocator,
    parameters: ParameterStore,
    pdo_mappings: PdoMappings,
}

impl EthernetDevice {
    /// Create a session for the drive at `host:port`, not yet connected
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            transport: None,
            ids: SeqIdAllocator::new(),
            parameters: ParameterStore::new(),
            pdo_mappings: PdoMappings::default(),
        }
    }

    /// Open the TCP connection, replacing any existing one
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.take().is_some() {
            log::debug!("replacing existing connection to {}:{}", self.host, self.port);
        }
        let transport = Transport::connect(&self.host, self.port).await?;
        log::info!("connected to {}:{}", self.host, self.port);
        self.transport = Some(transport);
        Ok(())
    }

    /// Close the TCP connection; local state (parameters, mappings) is kept
    pub async fn disconnect(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(error) = transport.shutdown().await {
                log::debug!("socket shutdown failed: {error}");
            }
            log::info!("disconnected from {}:{}", self.host, self.port);
        }
    }

    /// Whether the session currently holds a connection
    ///
    /// This reflects the local socket state only; a device that stopped
    /// answering still counts as connected until the caller reconnects.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&self) -> Result<&Transport> {
        self.transport.as_ref().context(NotConnectedSnafu)
    }

    /// Read the current EtherCAT application-layer state of the drive
    pub async fn get_state(&self, deadline: Duration) -> Result<EcatState> {
        let payload = request_segmented(
            self.transport()?,
            &self.ids,
            MessageType::StateRead,
            Vec::new(),
            deadline,
        )
        .await?;
        let raw = *payload.first().context(ProtocolSnafu {
            message: "state reply carries no payload",
        })?;
        EcatState::try_from(raw).map_err(|_| {
            ProtocolSnafu {
                message: "state reply carries an unknown state",
            }
            .build()
        })
    }

    /// Command the drive into `state`
    ///
    /// The session itself stays connected; only the remote state machine
    /// moves.
    pub async fn set_state(&self, state: EcatState, deadline: Duration) -> Result<()> {
        request_ack(
            self.transport()?,
            &self.ids,
            MessageType::StateControl,
            vec![state as u8],
            deadline,
        )
        .await
    }

    /// SDO-upload the current value of `(index, subindex)` from the drive
    ///
    /// The received bytes replace the raw data of the stored parameter with
    /// that identity, and a reference to the updated parameter is returned.
    /// The identity must already be known locally (from
    /// [`load_parameters`](Self::load_parameters) or
    /// [`insert_parameter`](Self::insert_parameter)).
    pub async fn upload(
        &mut self,
        index: u16,
        subindex: u8,
        deadline: Duration,
    ) -> Result<&Parameter> {
        let transport = self.transport.as_ref().context(NotConnectedSnafu)?;
        let data = request_segmented(
            transport,
            &self.ids,
            MessageType::SdoRead,
            sdo_address(index, subindex),
            deadline,
        )
        .await?;
        let parameter = self
            .parameters
            .find_mut(index, subindex)
            .context(ParameterUnknownSnafu { index, subindex })?;
        parameter.data = data;
        Ok(&*parameter)
    }

    /// SDO-upload a parameter and decode its value
    pub async fn upload_value(
        &mut self,
        index: u16,
        subindex: u8,
        deadline: Duration,
    ) -> Result<ParameterValue> {
        let parameter = self.upload(index, subindex, deadline).await?;
        parameter.value().context(ValueSnafu)
    }

    /// SDO-download the stored raw data of `(index, subindex)` to the drive
    pub async fn download(&self, index: u16, subindex: u8, deadline: Duration) -> Result<()> {
        let parameter = self
            .parameters
            .find(index, subindex)
            .context(ParameterUnknownSnafu { index, subindex })?;
        snafu::ensure!(
            !parameter.data.is_empty(),
            EmptyPayloadSnafu { index, subindex }
        );
        let mut payload = sdo_address(index, subindex);
        payload.extend_from_slice(&parameter.data);
        request_ack(
            self.transport()?,
            &self.ids,
            MessageType::SdoWrite,
            payload,
            deadline,
        )
        .await
    }

    /// Set a parameter value locally, then SDO-download it to the drive
    pub async fn download_value(
        &mut self,
        index: u16,
        subindex: u8,
        value: ParameterValue,
        deadline: Duration,
    ) -> Result<()> {
        self.set_parameter_value(index, subindex, &value)?;
        self.download(index, subindex, deadline).await
    }

    /// Fetch the full parameter list from the drive into the local store
    ///
    /// With `read_values` set the drive includes each parameter's current
    /// value; otherwise only the descriptors are transferred. Existing
    /// entries with the same identity are overwritten. Returns the number of
    /// parameters received.
    pub async fn load_parameters(&mut self, read_values: bool, deadline: Duration) -> Result<usize> {
        let transport = self.transport.as_ref().context(NotConnectedSnafu)?;
        let content = request_segmented(
            transport,
            &self.ids,
            MessageType::ParamFullList,
            vec![read_values as u8],
            deadline,
        )
        .await?;
        let parameters = parse_parameter_list(&content, read_values).context(ParameterListSnafu)?;
        let count = parameters.len();
        for parameter in parameters {
            self.parameters.insert(parameter);
        }
        log::info!("loaded {count} parameters from {}:{}", self.host, self.port);
        Ok(count)
    }

    /// Look up a parameter in the local store
    pub fn parameter(&self, index: u16, subindex: u8) -> Result<&Parameter> {
        self.parameters
            .find(index, subindex)
            .context(ParameterUnknownSnafu { index, subindex })
    }

    /// Set a parameter value in the local store only
    ///
    /// The drive is not informed; follow up with [`download`](Self::download)
    /// or let the next process data exchange carry it.
    pub fn set_parameter_value(
        &mut self,
        index: u16,
        subindex: u8,
        value: &ParameterValue,
    ) -> Result<()> {
        self.parameters
            .find_mut(index, subindex)
            .context(ParameterUnknownSnafu { index, subindex })?
            .set_value(value)
            .context(ValueSnafu)
    }

    /// Insert a parameter into the local store, e.g. one loaded from a
    /// configuration export, replacing any entry with the same identity
    pub fn insert_parameter(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter);
    }

    /// Iterate over the local store in ascending (index, subindex) order
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter_sorted()
    }

    /// Drop every locally stored parameter
    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    /// Install the PDO mappings used by process data exchanges
    pub fn set_pdo_mappings(&mut self, mappings: PdoMappings) {
        self.pdo_mappings = mappings;
    }

    /// The currently installed PDO mappings
    pub fn pdo_mappings(&self) -> &PdoMappings {
        &self.pdo_mappings
    }

    /// Read a file from the drive's filesystem
    pub async fn read_file(&self, name: &str, deadline: Duration) -> Result<Vec<u8>> {
        request_segmented(
            self.transport()?,
            &self.ids,
            MessageType::FileRead,
            name.as_bytes().to_vec(),
            deadline,
        )
        .await
    }

    /// List the files on the drive's filesystem
    ///
    /// With `strip_size_suffix` the `", size: <bytes>"` annotation the drive
    /// appends to each line is removed.
    pub async fn read_file_list(
        &self,
        strip_size_suffix: bool,
        deadline: Duration,
    ) -> Result<Vec<String>> {
        let raw = self.read_file(fs::GETLIST, deadline).await?;
        let text = String::from_utf8_lossy(&raw);
        let mut names = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let name = match (strip_size_suffix, line.rfind(fs::SIZE_SUFFIX)) {
                (true, Some(position)) => &line[..position],
                _ => line,
            };
            names.push(name.to_owned());
        }
        Ok(names)
    }

    /// Remove a file from the drive's filesystem
    ///
    /// Returns whether the drive acknowledged the removal.
    pub async fn remove_file(&self, name: &str, deadline: Duration) -> Result<bool> {
        let request = format!("{}{}", fs::REMOVE_PREFIX, name);
        let reply = self.read_file(&request, deadline).await?;
        let removed = reply.starts_with(fs::REMOVE_SUCCESS_PREFIX.as_bytes());
        if !removed {
            log::warn!(
                "drive refused to remove {name}: {}",
                String::from_utf8_lossy(&reply)
            );
        }
        Ok(removed)
    }

    /// Write a file to the drive's filesystem
    ///
    /// The name travels as the first segment, the content chunked across the
    /// following segments; every segment is acknowledged individually.
    pub async fn write_file(&self, name: &str, data: &[u8], deadline: Duration) -> Result<()> {
        let mut segments = Vec::with_capacity(1 + data.len().div_ceil(MAX_PAYLOAD_LEN));
        segments.push(name.as_bytes().to_vec());
        for chunk in data.chunks(MAX_PAYLOAD_LEN) {
            segments.push(chunk.to_vec());
        }
        send_segmented(
            self.transport()?,
            &self.ids,
            MessageType::FileWrite,
            segments,
            deadline,
        )
        .await
    }

    /// Ask the drive to apply previously written firmware images
    ///
    /// Issue this after writing `app_firmware.bin` (SoC firmware) and/or
    /// `com_firmware.bin` (communication chip firmware).
    pub async fn trigger_firmware_update(&self, deadline: Duration) -> Result<()> {
        request_ack(
            self.transport()?,
            &self.ids,
            MessageType::FirmwareUpdate,
            Vec::new(),
            deadline,
        )
        .await
    }

    /// One cyclic process data exchange
    ///
    /// Packs the RxPDO frame from the mapped parameters' current data, sends
    /// it, and distributes the returned TxPDO frame back into the store.
    /// Returns the number of unmapped trailing bytes in the reply (also
    /// logged as a warning when non-zero). On a truncated reply the entries
    /// served before the break stay committed.
    pub async fn exchange_process_data(&mut self, deadline: Duration) -> Result<usize> {
        let transport = self.transport.as_ref().context(NotConnectedSnafu)?;
        let rx_frame = pack_rx(&self.pdo_mappings, &self.parameters).context(PdoSnafu)?;
        let tx_frame = request_segmented(
            transport,
            &self.ids,
            MessageType::PdoRxTxFrame,
            rx_frame,
            deadline,
        )
        .await?;
        let extra = unpack_tx(&self.pdo_mappings, &mut self.parameters, &tx_frame)
            .context(PdoSnafu)?;
        if extra > 0 {
            log::warn!("process data reply carries {extra} unmapped trailing bytes");
        }
        Ok(extra)
    }
}
