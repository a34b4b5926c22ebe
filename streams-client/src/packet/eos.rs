// SPDX-License-Identifier: Apache-2.0

use super::header::{ControlSignalType, Descriptor};
use super::pack::{make_packet, Value};
use super::{Packet, PacketTypeId};
use bytes::Bytes;

/// Builds an end-of-stream control packet carrying `reason` as its payload.
#[allow(clippy::expect_used)]
pub fn make_eos_packet(reason: impl Into<String>) -> Packet {
    let reason = reason.into();
    // `pack` only rejects a control value on a header/payload mismatch this
    // call never produces, so this is structurally infallible.
    make_packet(
        Value::Control {
            sub_type: ControlSignalType::Eos,
            reason: reason.clone(),
            bytes: Bytes::from(reason.into_bytes()),
        },
        None,
        true,
    )
    .expect("an EOS control packet always packs successfully")
}

/// True if `packet` is a control signal of sub-type EOS.
pub fn is_eos(packet: &Packet) -> bool {
    is_control_signal(packet)
        && matches!(
            packet.header().descriptor,
            Descriptor::ControlSignal {
                sub_type: ControlSignalType::Eos,
                ..
            }
        )
}

/// True if `packet` carries a control signal of any sub-type.
pub fn is_control_signal(packet: &Packet) -> bool {
    packet.packet_type_id() == PacketTypeId::ControlSignal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eos_packet_is_recognized() {
        let packet = make_eos_packet("upstream closed");
        assert!(is_control_signal(&packet));
        assert!(is_eos(&packet));
    }

    #[test]
    fn non_eos_control_signal_is_not_eos() {
        let mut packet = Packet::default();
        packet.header_mut().type_id = PacketTypeId::ControlSignal;
        packet.header_mut().descriptor = Descriptor::ControlSignal {
            sub_type: ControlSignalType::Unknown,
            reason: String::new(),
        };
        assert!(is_control_signal(&packet));
        assert!(!is_eos(&packet));
    }

    #[test]
    fn jpeg_packet_is_not_control_signal() {
        let mut packet = Packet::default();
        packet.header_mut().type_id = PacketTypeId::Jpeg;
        assert!(!is_control_signal(&packet));
        assert!(!is_eos(&packet));
    }
}
