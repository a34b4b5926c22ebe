// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use streams_common::Status;

use super::flags::Flags;
use super::PacketTypeId;

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: now.as_secs() as i64,
            nanos: now.subsec_nanos() as i32,
        }
    }

    /// `microseconds()` convenience from spec §4.4.
    pub fn microseconds(&self) -> i64 {
        self.seconds * 1_000_000 + (self.nanos as i64) / 1_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawImageFormat {
    #[default]
    Unknown,
    Srgb,
    /// Any format value this enum doesn't model. `channels_for_format`
    /// rejects it rather than guessing a channel count.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSignalType {
    #[default]
    Unknown,
    Eos,
}

/// Per-type metadata describing the payload; `None` when the type carries
/// none (STRING, JPEG).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Descriptor {
    #[default]
    None,
    RawImage {
        format: RawImageFormat,
        height: i32,
        width: i32,
    },
    Protobuf {
        full_name: String,
        is_text: bool,
    },
    GstreamerCaps(String),
    ControlSignal {
        sub_type: ControlSignalType,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerMetadata {
    pub offset: i64,
}

/// A named side-channel attachment. Addendum names are unique per packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Addendum {
    Text(String),
    Protobuf { full_name: String, bytes: Bytes },
}

#[derive(Debug, Clone, Default)]
pub struct Header {
    pub type_id: PacketTypeId,
    pub descriptor: Descriptor,
    pub timestamp: Timestamp,
    pub flags: Flags,
    pub server_metadata: ServerMetadata,
    pub trace_context: Option<String>,
    pub addenda: HashMap<String, Addendum>,
}

impl Header {
    /// `RestoreDefaultPacketFlags`: image/protobuf/string/gstreamer-buffer
    /// packets default to both bits set; control-signal defaults to
    /// neither.
    pub fn restore_default_flags(&mut self) {
        self.flags = Flags::empty();
        if !matches!(self.type_id, PacketTypeId::ControlSignal | PacketTypeId::Unknown) {
            self.flags.set_frame_head();
            self.flags.set_key_frame();
        }
    }

    /// Inserts an addendum under `name`. Fails with `AlreadyExists` if the
    /// name is taken, leaving the existing entry untouched.
    pub fn insert_addendum(&mut self, name: impl Into<String>, value: Addendum) -> Result<(), Status> {
        let name = name.into();
        if self.addenda.contains_key(&name) {
            return Err(Status::already_exists(format!(
                "addendum '{name}' already exists"
            )));
        }
        self.addenda.insert(name, value);
        Ok(())
    }

    pub fn get_addendum_text(&self, name: &str) -> Result<&str, Status> {
        match self.addenda.get(name) {
            Some(Addendum::Text(text)) => Ok(text),
            Some(Addendum::Protobuf { .. }) => Err(Status::invalid_argument(format!(
                "addendum '{name}' is a protobuf, not text"
            ))),
            None => Err(Status::not_found(format!("no addendum named '{name}'"))),
        }
    }

    pub fn get_addendum_protobuf(&self, name: &str) -> Result<(&str, &Bytes), Status> {
        match self.addenda.get(name) {
            Some(Addendum::Protobuf { full_name, bytes }) => Ok((full_name, bytes)),
            Some(Addendum::Text(_)) => Err(Status::invalid_argument(format!(
                "addendum '{name}' is text, not a protobuf"
            ))),
            None => Err(Status::not_found(format!("no addendum named '{name}'"))),
        }
    }

    /// No-op if `name` is absent.
    pub fn delete_addendum(&mut self, name: &str) {
        self.addenda.remove(name);
    }

    /// Copies timestamp, addenda, server_metadata, and trace_context from
    /// `other` onto `self`. Used by the decoded-receiver header carry-over
    /// (C9).
    pub fn carry_over_from(&mut self, other: &Header) {
        self.timestamp = other.timestamp;
        self.addenda = other.addenda.clone();
        self.server_metadata = other.server_metadata;
        self.trace_context = other.trace_context.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_by_type() {
        let mut h = Header {
            type_id: PacketTypeId::Jpeg,
            ..Default::default()
        };
        h.restore_default_flags();
        assert!(h.flags.is_frame_head());
        assert!(h.flags.is_key_frame());

        let mut c = Header {
            type_id: PacketTypeId::ControlSignal,
            ..Default::default()
        };
        c.flags.set_frame_head();
        c.restore_default_flags();
        assert!(!c.flags.is_frame_head());
        assert!(!c.flags.is_key_frame());
    }

    #[test]
    fn addendum_insert_is_unique() {
        let mut h = Header::default();
        h.insert_addendum("a", Addendum::Text("one".into())).unwrap();
        let err = h.insert_addendum("a", Addendum::Text("two".into())).unwrap_err();
        assert_eq!(err.kind(), streams_common::StatusKind::AlreadyExists);
        assert_eq!(h.get_addendum_text("a").unwrap(), "one");
    }

    #[test]
    fn addendum_get_missing_is_not_found() {
        let h = Header::default();
        let err = h.get_addendum_text("missing").unwrap_err();
        assert_eq!(err.kind(), streams_common::StatusKind::NotFound);
    }

    #[test]
    fn addendum_delete_is_noop_when_absent() {
        let mut h = Header::default();
        h.delete_addendum("missing");
    }

    #[test]
    fn microseconds_conversion() {
        let t = Timestamp {
            seconds: 2,
            nanos: 500_000,
        };
        assert_eq!(t.microseconds(), 2_000_500);
    }
}
