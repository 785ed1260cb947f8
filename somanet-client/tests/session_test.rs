//! Session lifecycle, state control, parameter list retrieval and deadlines.

use std::time::{Duration, Instant};

use somanet_client::common::frame::{EcatState, FrameStatus, MessageType, SqiReplyStatus};
use somanet_client::common::objects::ObjectFlags;
use somanet_client::common::value::{ObjectDataType, ParameterValue};
use somanet_client::{DeviceError, EthernetDevice};

mod util;
use util::{ack, connected_device, descriptor, ok, parameter, reply, spawn_mock};

const DEADLINE: Duration = Duration::from_secs(1);

#[tokio::test]
async fn connect_disconnect_lifecycle() {
    let (addr, _received) = spawn_mock(|request| Some(ack(request))).await;

    let mut device = EthernetDevice::new(addr.ip().to_string(), addr.port());
    assert!(!device.is_connected());

    device.connect().await.unwrap();
    assert!(device.is_connected());

    device.disconnect().await;
    assert!(!device.is_connected());

    // Operations without a connection fail locally
    let error = device.get_state(DEADLINE).await.unwrap_err();
    assert!(matches!(error, DeviceError::NotConnected));
}

#[tokio::test]
async fn get_state_reads_reply_payload() {
    let (addr, received) = spawn_mock(|request| {
        assert_eq!(request.message_type, MessageType::StateRead);
        Some(ok(request, vec![EcatState::Op as u8]))
    })
    .await;

    let device = connected_device(addr).await;
    assert_eq!(device.get_state(DEADLINE).await.unwrap(), EcatState::Op);
    assert!(received.lock().unwrap()[0].payload.is_empty());
}

#[tokio::test]
async fn set_state_sends_state_byte() {
    let (addr, received) = spawn_mock(|request| {
        assert_eq!(request.message_type, MessageType::StateControl);
        Some(ack(request))
    })
    .await;

    let device = connected_device(addr).await;
    device.set_state(EcatState::PreOp, DEADLINE).await.unwrap();
    assert_eq!(received.lock().unwrap()[0].payload, [2]);
}

#[tokio::test]
async fn load_parameters_populates_the_store() {
    // Serve the descriptor stream split over two segments
    let mut vendor = parameter(0x1018, 0x01, ObjectDataType::Unsigned32, 32);
    vendor.name = "Vendor ID".into();
    vendor.flags = ObjectFlags::BACKUP;
    let mut version = parameter(0x100A, 0x00, ObjectDataType::VisibleString, 48);
    version.name = "Manufacturer Software Version".into();

    let first = descriptor(&vendor, Some(&[0xD2, 0x22, 0x00, 0x00]));
    let second = descriptor(&version, Some(b"4.1.0\0"));

    let mut call = 0;
    let (addr, received) = spawn_mock(move |request| {
        assert_eq!(request.message_type, MessageType::ParamFullList);
        call += 1;
        Some(match call {
            1 => reply(request, FrameStatus::First, SqiReplyStatus::Ack, first.clone()),
            _ => reply(request, FrameStatus::Last, SqiReplyStatus::Ack, second.clone()),
        })
    })
    .await;

    let mut device = connected_device(addr).await;
    let count = device.load_parameters(true, DEADLINE).await.unwrap();
    assert_eq!(count, 2);

    // The request carried the read-values flag
    assert_eq!(received.lock().unwrap()[0].payload, [1]);

    let vendor_id = device.parameter(0x1018, 0x01).unwrap();
    assert_eq!(vendor_id.name, "Vendor ID");
    assert_eq!(vendor_id.value().unwrap(), ParameterValue::U32(0x0000_22D2));
    assert!(vendor_id.flags.contains(ObjectFlags::BACKUP));

    assert_eq!(
        device.parameter(0x100A, 0x00).unwrap().value().unwrap(),
        ParameterValue::String("4.1.0".into())
    );

    // The store iterates in ascending identity order
    let keys: Vec<_> = device.parameters().map(|p| p.key()).collect();
    assert_eq!(keys, [(0x100A, 0x00), (0x1018, 0x01)]);

    device.clear_parameters();
    assert!(device.parameters().next().is_none());
}

#[tokio::test]
async fn load_parameters_without_values_keeps_data_empty() {
    let descriptor_bytes = descriptor(
        &parameter(0x6040, 0x00, ObjectDataType::Unsigned16, 16),
        None,
    );
    let (addr, received) = spawn_mock(move |request| Some(ok(request, descriptor_bytes.clone()))).await;

    let mut device = connected_device(addr).await;
    device.load_parameters(false, DEADLINE).await.unwrap();
    assert_eq!(received.lock().unwrap()[0].payload, [0]);
    assert!(device.parameter(0x6040, 0x00).unwrap().data.is_empty());
}

#[tokio::test]
async fn deadline_expiry_returns_timeout() {
    // A drive that never answers
    let (addr, _received) = spawn_mock(|_request| None).await;

    let device = connected_device(addr).await;
    let started = Instant::now();
    let error = device.get_state(Duration::from_millis(50)).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(error, DeviceError::Timeout { .. }));
    assert!(error.poisons_connection());
    // Bounded cancellation slack: well under a second
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
    // The socket state is unknown but the session still reports connected
    assert!(device.is_connected());
}

#[tokio::test]
async fn local_set_value_feeds_later_download() {
    let (addr, received) = spawn_mock(|request| Some(ack(request))).await;

    let mut device = connected_device(addr).await;
    device.insert_parameter(parameter(0x6060, 0x00, ObjectDataType::Integer8, 8));

    device
        .set_parameter_value(0x6060, 0x00, &ParameterValue::I8(8))
        .unwrap();
    device.download(0x6060, 0x00, DEADLINE).await.unwrap();
    assert_eq!(received.lock().unwrap()[0].payload, [0x60, 0x60, 0x00, 0x08]);

    // A mismatched variant is rejected without touching the store
    let error = device
        .set_parameter_value(0x6060, 0x00, &ParameterValue::U32(1))
        .unwrap_err();
    assert!(matches!(error, DeviceError::Value { .. }));
}
