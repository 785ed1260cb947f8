#![allow(dead_code)]
//! In-process mock drive used by the integration tests: a TCP listener
//! speaking the framed protocol, with a caller-supplied reply policy.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use somanet_client::common::frame::{
    EthernetFrame, FrameStatus, SqiReplyStatus, HEADER_LEN,
};
use somanet_client::common::objects::{ObjectFlags, Parameter};
use somanet_client::common::value::ObjectDataType;
use somanet_client::EthernetDevice;

/// Frames received by a mock drive, in arrival order
pub type Received = Arc<Mutex<Vec<EthernetFrame>>>;

/// Spawn a mock drive accepting one connection
///
/// Every received frame is recorded and passed to `respond`; a `None` reply
/// keeps the drive silent (for deadline tests). Returns the listening
/// address and the record of received frames.
pub async fn spawn_mock<F>(mut respond: F) -> (SocketAddr, Received)
where
    F: FnMut(&EthernetFrame) -> Option<EthernetFrame> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let record = received.clone();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        loop {
            let mut buffer = vec![0u8; HEADER_LEN];
            if stream.read_exact(&mut buffer).await.is_err() {
                break;
            }
            let size = u16::from_le_bytes([buffer[5], buffer[6]]) as usize;
            buffer.resize(HEADER_LEN + size, 0);
            if stream.read_exact(&mut buffer[HEADER_LEN..]).await.is_err() {
                break;
            }
            let frame = EthernetFrame::parse(&buffer).expect("mock received malformed frame");
            record.lock().unwrap().push(frame.clone());
            if let Some(reply) = respond(&frame) {
                if stream.write_all(&reply.serialize()).await.is_err() {
                    break;
                }
            }
        }
    });

    (addr, received)
}

/// Build a reply echoing the request's type and sequence id
pub fn reply(
    request: &EthernetFrame,
    status: FrameStatus,
    sqi: SqiReplyStatus,
    payload: Vec<u8>,
) -> EthernetFrame {
    EthernetFrame {
        message_type: request.message_type,
        id: request.id,
        status,
        sqi_status: sqi,
        payload,
    }
}

/// An empty OK/ACK acknowledgement
pub fn ack(request: &EthernetFrame) -> EthernetFrame {
    reply(request, FrameStatus::Ok, SqiReplyStatus::Ack, Vec::new())
}

/// An OK/ACK reply carrying `payload`
pub fn ok(request: &EthernetFrame, payload: Vec<u8>) -> EthernetFrame {
    reply(request, FrameStatus::Ok, SqiReplyStatus::Ack, payload)
}

/// A device session connected to `addr`
pub async fn connected_device(addr: SocketAddr) -> EthernetDevice {
    let mut device = EthernetDevice::new(addr.ip().to_string(), addr.port());
    device.connect().await.unwrap();
    device
}

/// A VAR parameter with the given identity and scalar type
pub fn parameter(index: u16, subindex: u8, data_type: ObjectDataType, bit_length: u16) -> Parameter {
    Parameter {
        index,
        subindex,
        name: format!("object {index:#06x}:{subindex}"),
        bit_length,
        data_type,
        access: ObjectFlags::ALL_RDWR,
        ..Default::default()
    }
}

/// One on-wire descriptor record for the parameter list stream
pub fn descriptor(param: &Parameter, value: Option<&[u8]>) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&param.index.to_le_bytes());
    record.push(param.subindex);
    record.push(param.code.into());
    record.extend_from_slice(&u16::from(param.data_type).to_le_bytes());
    record.extend_from_slice(&param.bit_length.to_le_bytes());
    record.extend_from_slice(&param.flags.bits().to_le_bytes());
    record.extend_from_slice(&param.access.bits().to_le_bytes());
    record.push(param.name.len() as u8);
    record.extend_from_slice(param.name.as_bytes());
    if let Some(value) = value {
        record.extend_from_slice(&(value.len() as u16).to_le_bytes());
        record.extend_from_slice(value);
    }
    record
}
