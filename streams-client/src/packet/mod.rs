// SPDX-License-Identifier: Apache-2.0

//! The packet model (C4): a typed envelope exchanged with the server, plus
//! packers/unpackers for each concrete payload type.
//!
//! Per the redesign notes, dispatch happens on a tag (the [`PacketTypeId`]
//! carried in the header and the matching [`Payload`] variant), not via a
//! per-type traits object: a payload is a plain tagged enum and `pack`/
//! `unpack` are free functions that match on it.

mod eos;
mod flags;
mod header;
mod pack;
mod packet_as;
mod payload;

pub use eos::{is_control_signal, is_eos, make_eos_packet};
pub use flags::Flags;
pub use header::{
    Addendum, ControlSignalType, Descriptor, Header, RawImageFormat, ServerMetadata, Timestamp,
};
pub use pack::{make_packet, pack, unpack, RawImage, Value};
pub use packet_as::{FromPacketValue, PacketAs};
pub use payload::Payload;

use streams_common::Status;

/// The tag that determines how a packet's payload is interpreted. Carried
/// in the header independently of the payload itself, so it survives even
/// once a packet has been hollowed out by [`PacketAs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PacketTypeId {
    #[default]
    Unknown,
    Jpeg,
    RawImage,
    Protobuf,
    String,
    GstreamerBuffer,
    ControlSignal,
}

/// The atomic transport unit: a header plus an optional payload. The
/// payload is `None` for a "hollow" packet — either one under construction,
/// or one whose payload has been moved out by [`PacketAs`].
#[derive(Debug, Clone, Default)]
pub struct Packet {
    header: Header,
    payload: Option<Payload>,
}

impl Packet {
    pub fn from_parts(header: Header, payload: Option<Payload>) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    /// Moves the payload out, leaving the packet hollow (header intact).
    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    pub fn is_hollow(&self) -> bool {
        self.payload.is_none()
    }

    pub fn packet_type_id(&self) -> PacketTypeId {
        self.header.type_id
    }
}

/// `GetPacketTypeId(Packet) -> tag` from spec §4.4.
pub fn get_packet_type_id(packet: &Packet) -> PacketTypeId {
    packet.packet_type_id()
}

pub(crate) fn channels_for_format(format: RawImageFormat) -> Result<usize, Status> {
    match format {
        RawImageFormat::Srgb => Ok(3),
        RawImageFormat::Unknown => Ok(1),
        RawImageFormat::Other => Err(Status::unimplemented(format!(
            "raw image format {format:?} is unimplemented"
        ))),
    }
}
