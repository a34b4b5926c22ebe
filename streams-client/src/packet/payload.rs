// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;

/// The raw bytes of a packet, tagged by type. Interpretation is governed by
/// the owning packet's header (`type_id` and `descriptor`); this enum only
/// carries the opaque bytes for each case. Dispatch on the tag, not on a
/// per-type trait object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Jpeg(Bytes),
    RawImage(Bytes),
    Protobuf(Bytes),
    String(Bytes),
    GstreamerBuffer(Bytes),
    Control(Bytes),
}

impl Payload {
    pub fn bytes(&self) -> &Bytes {
        match self {
            Payload::Jpeg(b)
            | Payload::RawImage(b)
            | Payload::Protobuf(b)
            | Payload::String(b)
            | Payload::GstreamerBuffer(b)
            | Payload::Control(b) => b,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Jpeg(b)
            | Payload::RawImage(b)
            | Payload::Protobuf(b)
            | Payload::String(b)
            | Payload::GstreamerBuffer(b)
            | Payload::Control(b) => b,
        }
    }
}
