//! Cyclic process data exchange against a mock drive.

use std::time::Duration;

use somanet_client::common::device_config::DeviceConfig;
use somanet_client::common::frame::MessageType;
use somanet_client::common::value::{ObjectDataType, ParameterValue};
use somanet_client::common::pdo::PdoError;
use somanet_client::DeviceError;

mod util;
use util::{connected_device, ok, parameter, spawn_mock};

const DEADLINE: Duration = Duration::from_secs(1);

const CONFIG: &str = r#"{
    "pdoMapping": {
        "rx": { "0x1600": ["0x607A0020", "0x60400010"] },
        "tx": { "0x1A00": ["0x60640020", "0x60410010"] }
    }
}"#;

async fn mapped_device(addr: std::net::SocketAddr) -> somanet_client::EthernetDevice {
    let mut device = connected_device(addr).await;
    device.set_pdo_mappings(DeviceConfig::load_from_str(CONFIG).unwrap().pdo_mappings());

    for (index, data_type, bits, value) in [
        (0x607A, ObjectDataType::Integer32, 32, ParameterValue::I32(100)),
        (0x6040, ObjectDataType::Unsigned16, 16, ParameterValue::U16(0x000F)),
        (0x6064, ObjectDataType::Integer32, 32, ParameterValue::I32(0)),
        (0x6041, ObjectDataType::Unsigned16, 16, ParameterValue::U16(0)),
    ] {
        let mut param = parameter(index, 0, data_type, bits);
        param.set_value(&value).unwrap();
        device.insert_parameter(param);
    }
    device
}

#[tokio::test]
async fn process_data_round_trip() {
    let (addr, received) = spawn_mock(|request| {
        assert_eq!(request.message_type, MessageType::PdoRxTxFrame);
        // actual position 10000, statusword 0x0237
        Some(ok(request, vec![0x10, 0x27, 0x00, 0x00, 0x37, 0x02]))
    })
    .await;

    let mut device = mapped_device(addr).await;
    let extra = device.exchange_process_data(DEADLINE).await.unwrap();
    assert_eq!(extra, 0);

    // The request carried the packed RxPDO frame
    assert_eq!(
        received.lock().unwrap()[0].payload,
        [0x64, 0x00, 0x00, 0x00, 0x0F, 0x00]
    );

    // The TxPDO frame landed in the mapped parameters
    assert_eq!(
        device.parameter(0x6064, 0).unwrap().value().unwrap(),
        ParameterValue::I32(10_000)
    );
    assert_eq!(
        device.parameter(0x6041, 0).unwrap().value().unwrap(),
        ParameterValue::U16(0x0237)
    );
}

#[tokio::test]
async fn truncated_reply_commits_prefix_and_fails() {
    let (addr, _received) = spawn_mock(|request| {
        // one byte short of the 6 the mapping requires
        Some(ok(request, vec![0x01, 0x02, 0x03, 0x04, 0x05]))
    })
    .await;

    let mut device = mapped_device(addr).await;
    let error = device.exchange_process_data(DEADLINE).await.unwrap_err();
    assert!(matches!(
        error,
        DeviceError::Pdo {
            source: PdoError::TruncatedPdo { index: 0x6041, subindex: 0, committed: 4 }
        }
    ));

    // The first mapped entry was still updated
    assert_eq!(
        device.parameter(0x6064, 0).unwrap().value().unwrap(),
        ParameterValue::I32(0x0403_0201)
    );
    // The second kept its previous value
    assert_eq!(
        device.parameter(0x6041, 0).unwrap().value().unwrap(),
        ParameterValue::U16(0)
    );
}

#[tokio::test]
async fn oversized_reply_reports_extra_bytes() {
    let (addr, _received) = spawn_mock(|request| {
        Some(ok(request, vec![0; 8])) // two bytes beyond the mapping
    })
    .await;

    let mut device = mapped_device(addr).await;
    assert_eq!(device.exchange_process_data(DEADLINE).await.unwrap(), 2);
}

#[tokio::test]
async fn unmapped_parameter_aborts_before_the_wire() {
    let (addr, received) = spawn_mock(|request| Some(ok(request, Vec::new()))).await;

    let mut device = connected_device(addr).await;
    device.set_pdo_mappings(DeviceConfig::load_from_str(CONFIG).unwrap().pdo_mappings());
    // Store left empty: packing cannot resolve 0x607A:00

    let error = device.exchange_process_data(DEADLINE).await.unwrap_err();
    assert!(matches!(
        error,
        DeviceError::Pdo {
            source: PdoError::ParameterUnknown { index: 0x607A, subindex: 0 }
        }
    ));
    assert!(received.lock().unwrap().is_empty());
}
