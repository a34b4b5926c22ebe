// SPDX-License-Identifier: Apache-2.0

//! Generated gRPC client/server stubs for the wire surface described in
//! spec §6, plus the conversions between the wire `Packet` message and the
//! domain [`crate::packet::Packet`].

#![allow(clippy::all)]
tonic::include_proto!("packetstream.v1");

use bytes::Bytes;
use std::collections::HashMap;

use crate::packet::{self as domain, PacketTypeId};
use streams_common::Status;

impl From<PacketType> for PacketTypeId {
    fn from(value: PacketType) -> Self {
        match value {
            PacketType::Unknown => PacketTypeId::Unknown,
            PacketType::Jpeg => PacketTypeId::Jpeg,
            PacketType::RawImage => PacketTypeId::RawImage,
            PacketType::Protobuf => PacketTypeId::Protobuf,
            PacketType::String => PacketTypeId::String,
            PacketType::GstreamerBuffer => PacketTypeId::GstreamerBuffer,
            PacketType::ControlSignal => PacketTypeId::ControlSignal,
        }
    }
}

impl From<PacketTypeId> for PacketType {
    fn from(value: PacketTypeId) -> Self {
        match value {
            PacketTypeId::Unknown => PacketType::Unknown,
            PacketTypeId::Jpeg => PacketType::Jpeg,
            PacketTypeId::RawImage => PacketType::RawImage,
            PacketTypeId::Protobuf => PacketType::Protobuf,
            PacketTypeId::String => PacketType::String,
            PacketTypeId::GstreamerBuffer => PacketType::GstreamerBuffer,
            PacketTypeId::ControlSignal => PacketType::ControlSignal,
        }
    }
}

impl From<RawImageFormat> for domain::RawImageFormat {
    fn from(value: RawImageFormat) -> Self {
        match value {
            RawImageFormat::Srgb => domain::RawImageFormat::Srgb,
            RawImageFormat::FormatUnknown => domain::RawImageFormat::Unknown,
            RawImageFormat::FormatOther => domain::RawImageFormat::Other,
        }
    }
}

impl From<domain::RawImageFormat> for RawImageFormat {
    fn from(value: domain::RawImageFormat) -> Self {
        match value {
            domain::RawImageFormat::Srgb => RawImageFormat::Srgb,
            domain::RawImageFormat::Unknown => RawImageFormat::FormatUnknown,
            domain::RawImageFormat::Other => RawImageFormat::FormatOther,
        }
    }
}

fn raw_image_format_from_wire(value: i32) -> domain::RawImageFormat {
    RawImageFormat::try_from(value)
        .unwrap_or(RawImageFormat::FormatUnknown)
        .into()
}

impl From<ControlSignalType> for domain::ControlSignalType {
    fn from(value: ControlSignalType) -> Self {
        match value {
            ControlSignalType::Eos => domain::ControlSignalType::Eos,
            ControlSignalType::ControlUnknown => domain::ControlSignalType::Unknown,
        }
    }
}

impl From<domain::ControlSignalType> for ControlSignalType {
    fn from(value: domain::ControlSignalType) -> Self {
        match value {
            domain::ControlSignalType::Eos => ControlSignalType::Eos,
            domain::ControlSignalType::Unknown => ControlSignalType::ControlUnknown,
        }
    }
}

fn control_signal_type_from_wire(value: i32) -> domain::ControlSignalType {
    ControlSignalType::try_from(value)
        .unwrap_or(ControlSignalType::ControlUnknown)
        .into()
}

fn header_to_wire(header: &domain::Header) -> PacketHeader {
    let descriptor = match &header.descriptor {
        domain::Descriptor::None => None,
        domain::Descriptor::RawImage {
            format,
            height,
            width,
        } => Some(packet_header::Descriptor::RawImage(RawImageDescriptor {
            format: RawImageFormat::from(*format) as i32,
            height: *height,
            width: *width,
        })),
        domain::Descriptor::Protobuf { full_name, is_text } => {
            Some(packet_header::Descriptor::Protobuf(ProtobufDescriptor {
                full_name: full_name.clone(),
                is_text: *is_text,
            }))
        }
        domain::Descriptor::GstreamerCaps(caps) => {
            Some(packet_header::Descriptor::GstreamerCaps(caps.clone()))
        }
        domain::Descriptor::ControlSignal { sub_type, reason } => Some(
            packet_header::Descriptor::ControlSignal(ControlSignalDescriptor {
                sub_type: ControlSignalType::from(*sub_type) as i32,
                reason: reason.clone(),
            }),
        ),
    };

    let addenda = header
        .addenda
        .iter()
        .map(|(name, addendum)| {
            let value = match addendum {
                domain::Addendum::Text(text) => addendum::Value::Text(text.clone()),
                domain::Addendum::Protobuf { bytes, .. } => {
                    addendum::Value::ProtoBytes(bytes.to_vec())
                }
            };
            let proto_type_name = match addendum {
                domain::Addendum::Text(_) => String::new(),
                domain::Addendum::Protobuf { full_name, .. } => full_name.clone(),
            };
            (
                name.clone(),
                Addendum {
                    proto_type_name,
                    value: Some(value),
                },
            )
        })
        .collect();

    PacketHeader {
        r#type: PacketType::from(header.type_id) as i32,
        descriptor,
        timestamp: Some(Timestamp {
            seconds: header.timestamp.seconds,
            nanos: header.timestamp.nanos,
        }),
        flags: header.flags.bits(),
        server_metadata: Some(ServerMetadata {
            offset: header.server_metadata.offset,
        }),
        trace_context: header.trace_context.clone().unwrap_or_default(),
        addenda,
    }
}

fn header_from_wire(wire: PacketHeader) -> Result<domain::Header, Status> {
    let type_id = PacketTypeId::from(PacketType::try_from(wire.r#type).unwrap_or(PacketType::Unknown));
    let descriptor = match wire.descriptor {
        None => domain::Descriptor::None,
        Some(packet_header::Descriptor::RawImage(d)) => domain::Descriptor::RawImage {
            format: raw_image_format_from_wire(d.format),
            height: d.height,
            width: d.width,
        },
        Some(packet_header::Descriptor::Protobuf(d)) => domain::Descriptor::Protobuf {
            full_name: d.full_name,
            is_text: d.is_text,
        },
        Some(packet_header::Descriptor::GstreamerCaps(caps)) => {
            domain::Descriptor::GstreamerCaps(caps)
        }
        Some(packet_header::Descriptor::ControlSignal(d)) => domain::Descriptor::ControlSignal {
            sub_type: control_signal_type_from_wire(d.sub_type),
            reason: d.reason,
        },
    };
    let timestamp = wire
        .timestamp
        .map(|t| domain::Timestamp {
            seconds: t.seconds,
            nanos: t.nanos,
        })
        .unwrap_or_default();
    let server_metadata = wire
        .server_metadata
        .map(|m| domain::ServerMetadata { offset: m.offset })
        .unwrap_or_default();
    let addenda: HashMap<String, domain::Addendum> = wire
        .addenda
        .into_iter()
        .filter_map(|(name, a)| {
            let value = match a.value {
                Some(addendum::Value::Text(text)) => domain::Addendum::Text(text),
                Some(addendum::Value::ProtoBytes(bytes)) => domain::Addendum::Protobuf {
                    full_name: a.proto_type_name,
                    bytes: Bytes::from(bytes),
                },
                None => return None,
            };
            Some((name, value))
        })
        .collect();

    Ok(domain::Header {
        type_id,
        descriptor,
        timestamp,
        flags: domain::Flags::from_bits(wire.flags),
        server_metadata,
        trace_context: if wire.trace_context.is_empty() {
            None
        } else {
            Some(wire.trace_context)
        },
        addenda,
    })
}

impl TryFrom<Packet> for domain::Packet {
    type Error = Status;

    fn try_from(wire: Packet) -> Result<Self, Status> {
        let header = header_from_wire(wire.header.unwrap_or_default())?;
        let payload = match header.type_id {
            PacketTypeId::Unknown => None,
            PacketTypeId::Jpeg => Some(domain::Payload::Jpeg(Bytes::from(wire.payload))),
            PacketTypeId::RawImage => Some(domain::Payload::RawImage(Bytes::from(wire.payload))),
            PacketTypeId::Protobuf => Some(domain::Payload::Protobuf(Bytes::from(wire.payload))),
            PacketTypeId::String => Some(domain::Payload::String(Bytes::from(wire.payload))),
            PacketTypeId::GstreamerBuffer => {
                Some(domain::Payload::GstreamerBuffer(Bytes::from(wire.payload)))
            }
            PacketTypeId::ControlSignal => {
                Some(domain::Payload::Control(Bytes::from(wire.payload)))
            }
        };
        Ok(domain::Packet::from_parts(header, payload))
    }
}

impl From<domain::Packet> for Packet {
    fn from(packet: domain::Packet) -> Self {
        let header = header_to_wire(packet.header());
        let payload = packet
            .payload()
            .map(|p| p.bytes().to_vec())
            .unwrap_or_default();
        Packet {
            header: Some(header),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_roundtrips_through_wire() {
        let domain_packet =
            domain::make_packet(domain::Value::String(Bytes::from_static(b"hi")), None, false)
                .unwrap();
        let wire = Packet::from(domain_packet.clone());
        let back = domain::Packet::try_from(wire).unwrap();
        assert_eq!(back.packet_type_id(), domain_packet.packet_type_id());
        assert_eq!(back.payload(), domain_packet.payload());
    }

    #[test]
    fn unknown_wire_type_has_no_payload() {
        let wire = Packet {
            header: Some(PacketHeader {
                r#type: PacketType::Unknown as i32,
                ..Default::default()
            }),
            payload: vec![1, 2, 3],
        };
        let back = domain::Packet::try_from(wire).unwrap();
        assert!(back.payload().is_none());
    }
}
