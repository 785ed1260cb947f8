//! Request/response helpers on top of the transport, including reassembly
//! and transmission of multi-segment payloads.
//!
//! The transport is strictly one-request/one-response, so a segmented
//! inbound payload is pulled with a request per segment: after a `First` or
//! `Middle` reply the next segment is elicited by re-sending the same
//! message type with an empty payload and a fresh sequence id. Outbound
//! segmentation mirrors that: every segment is its own exchange and must be
//! acknowledged before the next one goes out.

use std::time::Duration;

use tokio::time::Instant;

use somanet_common::frame::{EthernetFrame, FrameStatus, MessageType, SqiReplyStatus};

use crate::error::{
    DeviceBusySnafu, DeviceFaultSnafu, ProtocolSnafu, Result, TimeoutSnafu,
};
use crate::transport::{SeqIdAllocator, Transport};

/// Upper bound on a reassembled response; anything larger is treated as a
/// runaway device rather than a legitimate payload.
pub(crate) const MAX_REASSEMBLED_LEN: usize = 16 * 1024 * 1024;

/// Time left until `deadline_at`, or a `Timeout` error carrying the original
/// deadline once it has passed
fn remaining(deadline_at: Instant, deadline: Duration) -> Result<Duration> {
    let left = deadline_at.saturating_duration_since(Instant::now());
    if left.is_zero() {
        TimeoutSnafu { deadline }.fail()
    } else {
        Ok(left)
    }
}

/// Fail on replies whose SQI leg reported busy or failed
fn check_sqi(frame: &EthernetFrame) -> Result<()> {
    if frame.sqi_status == SqiReplyStatus::Bsy {
        return DeviceBusySnafu.fail();
    }
    if frame.sqi_status == SqiReplyStatus::Err {
        return DeviceFaultSnafu {
            status: frame.status as u8,
            sqi: frame.sqi_status as u8,
        }
        .fail();
    }
    Ok(())
}

/// One exchange whose reply must be a plain OK/ACK acknowledgement
pub(crate) async fn request_ack(
    transport: &Transport,
    ids: &SeqIdAllocator,
    message_type: MessageType,
    payload: Vec<u8>,
    deadline: Duration,
) -> Result<()> {
    let request = EthernetFrame::request(message_type, ids.next_id(), payload);
    let response = transport.exchange(&request, deadline).await?;
    expect_ack(&response)
}

fn expect_ack(response: &EthernetFrame) -> Result<()> {
    check_sqi(response)?;
    if response.status == FrameStatus::Err {
        return DeviceFaultSnafu {
            status: response.status as u8,
            sqi: response.sqi_status as u8,
        }
        .fail();
    }
    if response.status != FrameStatus::Ok || response.sqi_status != SqiReplyStatus::Ack {
        return ProtocolSnafu {
            message: "expected an OK/ACK reply",
        }
        .fail();
    }
    Ok(())
}

/// Send one logical request and reassemble a possibly segmented response
///
/// A single-frame response arrives with status `Ok` and is returned as-is.
/// A multi-segment response must follow `First (Middle*) Last`; the payloads
/// are concatenated in arrival order. Any device-reported error discards the
/// partial payload.
pub(crate) async fn request_segmented(
    transport: &Transport,
    ids: &SeqIdAllocator,
    message_type: MessageType,
    first_payload: Vec<u8>,
    deadline: Duration,
) -> Result<Vec<u8>> {
    let deadline_at = Instant::now() + deadline;
    let mut content: Vec<u8> = Vec::new();
    let mut payload = first_payload;
    let mut started = false;

    loop {
        let request =
            EthernetFrame::request(message_type, ids.next_id(), std::mem::take(&mut payload));
        let response = transport
            .exchange(&request, remaining(deadline_at, deadline)?)
            .await?;
        check_sqi(&response)?;

        match response.status {
            // A lone ERR reply is the device failing the operation itself; an
            // ERR inside a segment stream is a broken sequence.
            FrameStatus::Err if !started => {
                return DeviceFaultSnafu {
                    status: response.status as u8,
                    sqi: response.sqi_status as u8,
                }
                .fail()
            }
            FrameStatus::Err => {
                return ProtocolSnafu {
                    message: "segment sequence aborted by an ERR frame",
                }
                .fail()
            }
            FrameStatus::Ok if !started => return Ok(response.payload),
            FrameStatus::First if !started => {
                started = true;
                content.extend_from_slice(&response.payload);
            }
            FrameStatus::Middle if started => content.extend_from_slice(&response.payload),
            FrameStatus::Last if started => {
                content.extend_from_slice(&response.payload);
                log::debug!(
                    "reassembled {} bytes for {:?}",
                    content.len(),
                    message_type
                );
                return Ok(content);
            }
            _ => {
                return ProtocolSnafu {
                    message: "segment status out of sequence",
                }
                .fail()
            }
        }

        if content.len() > MAX_REASSEMBLED_LEN {
            return ProtocolSnafu {
                message: "reassembled response exceeds the size cap",
            }
            .fail();
        }
    }
}

/// Send a logical payload split over several segments
///
/// A single segment goes out with status `Ok`; otherwise the segments carry
/// `First`, `Middle`..., `Last`. Every segment gets a fresh sequence id and
/// must be acknowledged with OK/ACK before the next one is sent.
pub(crate) async fn send_segmented(
    transport: &Transport,
    ids: &SeqIdAllocator,
    message_type: MessageType,
    segments: Vec<Vec<u8>>,
    deadline: Duration,
) -> Result<()> {
    let deadline_at = Instant::now() + deadline;
    let count = segments.len();

    for (position, payload) in segments.into_iter().enumerate() {
        let status = if count == 1 {
            FrameStatus::Ok
        } else if position == 0 {
            FrameStatus::First
        } else if position + 1 == count {
            FrameStatus::Last
        } else {
            FrameStatus::Middle
        };
        let request =
            EthernetFrame::request_with_status(message_type, ids.next_id(), status, payload);
        let response = transport
            .exchange(&request, remaining(deadline_at, deadline)?)
            .await?;
        expect_ack(&response)?;
    }
    Ok(())
}
