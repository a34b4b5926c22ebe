// SPDX-License-Identifier: Apache-2.0

use streams_common::Status;

use super::pack::{unpack, Value};
use super::{Packet, PacketTypeId};

/// Bridges a concrete payload type to its [`PacketTypeId`] tag and the
/// matching [`Value`] case, so [`PacketAs`] can stay generic over `T`
/// while the real dispatch happens in [`unpack`].
pub trait FromPacketValue: Sized {
    const TYPE_ID: PacketTypeId;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromPacketValue for bytes::Bytes {
    const TYPE_ID: PacketTypeId = PacketTypeId::Jpeg;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Jpeg(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl FromPacketValue for super::RawImage {
    const TYPE_ID: PacketTypeId = PacketTypeId::RawImage;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::RawImage(image) => Some(image),
            _ => None,
        }
    }
}

/// A packet that has been unpacked (or attempted) as `T`. Holds the
/// original hollowed packet alongside either the typed value or the
/// failure status, so callers that only care about one side don't pay
/// for matching on a `Result` themselves.
pub struct PacketAs<T> {
    packet: Packet,
    outcome: Result<T, Status>,
}

impl<T: FromPacketValue> PacketAs<T> {
    /// Unpacks `packet` as `T`. The packet is always hollow afterward,
    /// whether or not the unpack succeeded.
    pub fn new(mut packet: Packet) -> Self {
        let outcome = match unpack(&mut packet, T::TYPE_ID) {
            Ok(value) => T::from_value(value).ok_or_else(|| {
                Status::internal("packet descriptor/payload matched the tag but not the type")
            }),
            Err(status) => Err(status),
        };
        Self { packet, outcome }
    }

    pub fn status(&self) -> Status {
        match &self.outcome {
            Ok(_) => Status::ok(),
            Err(status) => status.clone(),
        }
    }

    pub fn ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The hollowed source packet: header intact, payload moved out.
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// The unpacked value. Panics if `ok()` is false: this mirrors the
    /// original API's contract that accessing the value of a failed
    /// unpack is a programming error, not a recoverable one. Callers
    /// that want a `Result` should use `into_value` instead.
    #[allow(clippy::panic)]
    pub fn value(&self) -> &T {
        match &self.outcome {
            Ok(value) => value,
            Err(status) => panic!("PacketAs::value() called on a failed unpack: {status}"),
        }
    }

    pub fn into_value(self) -> Result<T, Status> {
        self.outcome
    }
}
