// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use streams_common::Status;

use super::header::{ControlSignalType, Descriptor, Header, RawImageFormat, Timestamp};
use super::payload::Payload;
use super::{channels_for_format, Packet, PacketTypeId};

/// A tightly packed, single-plane RGB (or other packed) raw image buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub format: RawImageFormat,
    pub height: i32,
    pub width: i32,
    pub bytes: Bytes,
}

impl RawImage {
    /// `GetBufferSize`: `height * width * channels`, where channels comes
    /// from the format (SRGB=3, Unknown=1).
    pub fn buffer_size(format: RawImageFormat, height: i32, width: i32) -> Result<usize, Status> {
        if height < 0 || width < 0 {
            return Err(Status::invalid_argument("negative raw image dimension"));
        }
        let channels = channels_for_format(format)?;
        Ok(height as usize * width as usize * channels)
    }

    /// Allocates a zeroed buffer of exactly `GetBufferSize` bytes.
    pub fn new_buffer(format: RawImageFormat, height: i32, width: i32) -> Result<Self, Status> {
        let size = Self::buffer_size(format, height, width)?;
        Ok(Self {
            format,
            height,
            width,
            bytes: Bytes::from(vec![0u8; size]),
        })
    }
}

/// The typed value a packet can be packed from or unpacked into. One
/// variant per supported payload type (§4.4's table).
#[derive(Debug, Clone)]
pub enum Value {
    Jpeg(Bytes),
    RawImage(RawImage),
    Protobuf {
        full_name: String,
        is_text: bool,
        bytes: Bytes,
    },
    String(Bytes),
    GstreamerBuffer {
        caps: String,
        bytes: Bytes,
    },
    Control {
        sub_type: ControlSignalType,
        reason: String,
        bytes: Bytes,
    },
}

impl Value {
    pub fn type_id(&self) -> PacketTypeId {
        match self {
            Value::Jpeg(_) => PacketTypeId::Jpeg,
            Value::RawImage(_) => PacketTypeId::RawImage,
            Value::Protobuf { .. } => PacketTypeId::Protobuf,
            Value::String(_) => PacketTypeId::String,
            Value::GstreamerBuffer { .. } => PacketTypeId::GstreamerBuffer,
            Value::Control { .. } => PacketTypeId::ControlSignal,
        }
    }
}

/// `Pack(T, &Packet) -> Status`: sets the header's type and descriptor and
/// the packet's payload atomically, then restores default flags for the
/// type. Setting type-id and payload is the same operation here by
/// construction: there is no window where one is set without the other.
pub fn pack(value: Value, packet: &mut Packet) -> Status {
    let type_id = value.type_id();
    match value {
        Value::Jpeg(bytes) => {
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::None;
            packet.set_payload(Payload::Jpeg(bytes));
        }
        Value::RawImage(image) => {
            let expected = match RawImage::buffer_size(image.format, image.height, image.width) {
                Ok(v) => v,
                Err(status) => return status,
            };
            if image.bytes.len() != expected {
                return Status::invalid_argument(format!(
                    "raw image payload is {} bytes, expected {expected}",
                    image.bytes.len()
                ));
            }
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::RawImage {
                format: image.format,
                height: image.height,
                width: image.width,
            };
            packet.set_payload(Payload::RawImage(image.bytes));
        }
        Value::Protobuf {
            full_name,
            is_text,
            bytes,
        } => {
            if full_name.is_empty() {
                return Status::invalid_argument("protobuf descriptor requires a full type name");
            }
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::Protobuf { full_name, is_text };
            packet.set_payload(Payload::Protobuf(bytes));
        }
        Value::String(bytes) => {
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::None;
            packet.set_payload(Payload::String(bytes));
        }
        Value::GstreamerBuffer { caps, bytes } => {
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::GstreamerCaps(caps);
            packet.set_payload(Payload::GstreamerBuffer(bytes));
        }
        Value::Control {
            sub_type,
            reason,
            bytes,
        } => {
            packet.header_mut().type_id = type_id;
            packet.header_mut().descriptor = Descriptor::ControlSignal { sub_type, reason };
            packet.set_payload(Payload::Control(bytes));
        }
    }
    packet.header_mut().restore_default_flags();
    Status::ok()
}

/// `Unpack(Packet, &T) -> Status`, generalized: takes the payload out of
/// `packet` unconditionally (the packet is hollow afterward either way) and
/// tries to interpret it as `expected`.
pub fn unpack(packet: &mut Packet, expected: PacketTypeId) -> Result<Value, Status> {
    let found = packet.packet_type_id();
    let descriptor = packet.header().descriptor.clone();
    let payload = packet.take_payload();

    if found != expected {
        return Err(Status::invalid_argument(format!(
            "expected a {expected:?} packet, found {found:?}"
        )));
    }

    let payload = payload.ok_or_else(|| {
        Status::failed_precondition("packet has no payload (already unpacked)")
    })?;

    match (payload, descriptor) {
        (Payload::Jpeg(bytes), _) => Ok(Value::Jpeg(bytes)),
        (Payload::RawImage(bytes), Descriptor::RawImage { format, height, width }) => {
            Ok(Value::RawImage(RawImage {
                format,
                height,
                width,
                bytes,
            }))
        }
        (Payload::Protobuf(bytes), Descriptor::Protobuf { full_name, is_text }) => {
            Ok(Value::Protobuf {
                full_name,
                is_text,
                bytes,
            })
        }
        (Payload::String(bytes), _) => Ok(Value::String(bytes)),
        (Payload::GstreamerBuffer(bytes), Descriptor::GstreamerCaps(caps)) => {
            Ok(Value::GstreamerBuffer { caps, bytes })
        }
        (Payload::Control(bytes), Descriptor::ControlSignal { sub_type, reason }) => {
            Ok(Value::Control {
                sub_type,
                reason,
                bytes,
            })
        }
        (payload, _) => Err(Status::invalid_argument(format!(
            "packet descriptor does not match its {:?} payload",
            payload
        ))),
    }
}

/// `MakePacket(T, [header], [set_current_time]) -> Packet|Error`.
pub fn make_packet(
    value: Value,
    header: Option<Header>,
    set_current_time: bool,
) -> Result<Packet, Status> {
    let mut packet = Packet::from_parts(header.unwrap_or_default(), None);
    let status = pack(value, &mut packet);
    if !status.is_ok() {
        return Err(status);
    }
    if set_current_time {
        packet.header_mut().timestamp = Timestamp::now();
    }
    Ok(packet)
}
