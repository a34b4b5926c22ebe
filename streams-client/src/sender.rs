// SPDX-License-Identifier: Apache-2.0

//! Raw packet sender (C6): sends packets on a stream via either one RPC per
//! packet (unary) or a single long-lived client-streaming RPC (streaming,
//! the default), finalizing the stream on teardown.

use rand::Rng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use streams_common::Status;

use crate::connection::{apply_rpc_options, ConnectionOptions, RpcOptions};
use crate::packet::Header;
use crate::proto::packet_stream_client::PacketStreamClient;
use crate::proto::Packet as WirePacket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketSenderMode {
    Unary,
    #[default]
    Streaming,
}

#[derive(Clone)]
pub struct SenderOptions {
    pub connection: ConnectionOptions,
    pub rpc_options: RpcOptions,
    pub mode: PacketSenderMode,
    /// Probability (0.0-1.0) of stamping a W3C traceparent on a given
    /// packet, quantized to units of 1/10000.
    pub trace_probability: f64,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            rpc_options: RpcOptions::default(),
            mode: PacketSenderMode::default(),
            trace_probability: 0.0,
        }
    }
}

enum Transport {
    Unary {
        client: PacketStreamClient<crate::connection::StreamChannel>,
    },
    Streaming {
        outbound: mpsc::Sender<WirePacket>,
    },
}

pub struct PacketSender {
    options: SenderOptions,
    transport: Transport,
}

impl PacketSender {
    pub async fn connect(options: SenderOptions) -> Result<Self, Status> {
        let channel = options.connection.connect().await?;
        let mut client = PacketStreamClient::new(channel);

        let transport = match options.mode {
            PacketSenderMode::Unary => Transport::Unary { client },
            PacketSenderMode::Streaming => {
                let (tx, rx) = mpsc::channel::<WirePacket>(16);
                let request = apply_rpc_options(
                    tonic::Request::new(ReceiverStream::new(rx)),
                    options.rpc_options,
                );
                // Detached: the spawned task owns the response future and
                // keeps running after `PacketSender` is dropped, observing
                // the server's final ack once `outbound` closes.
                tokio::spawn(async move {
                    if let Err(status) = client.send_packets(request).await {
                        warn!(error = %status, "send_packets RPC ended with an error");
                    }
                });
                Transport::Streaming { outbound: tx }
            }
        };

        Ok(Self { options, transport })
    }

    fn maybe_stamp_trace(&self, header: &mut Header) {
        if self.options.trace_probability <= 0.0 {
            return;
        }
        let threshold = (self.options.trace_probability.clamp(0.0, 1.0) * 10_000.0) as u32;
        let roll: u32 = rand::thread_rng().gen_range(0..10_000);
        if roll >= threshold {
            return;
        }
        let trace_id: u128 = rand::thread_rng().gen();
        let span_id: u64 = rand::thread_rng().gen();
        header.trace_context = Some(format!("00-{trace_id:032x}-{span_id:016x}-01"));
    }

    /// Sends one packet. Unary mode issues one RPC per call; streaming mode
    /// writes to the already-open outbound stream. Both report a transport
    /// failure as `Unknown`; the caller is expected to rebuild the sender.
    pub async fn send(&mut self, mut packet: crate::packet::Packet) -> Status {
        self.maybe_stamp_trace(packet.header_mut());
        let wire = WirePacket::from(packet);

        match &mut self.transport {
            Transport::Unary { client } => {
                let request = apply_rpc_options(tonic::Request::new(wire), self.options.rpc_options);
                match client.send_one_packet(request).await {
                    Ok(response) => {
                        if response.into_inner().accepted {
                            Status::ok()
                        } else {
                            Status::unknown("server did not accept the packet")
                        }
                    }
                    Err(status) => {
                        warn!(error = %status, "unary send failed");
                        Status::unknown(status.to_string())
                    }
                }
            }
            Transport::Streaming { outbound, .. } => match outbound.send(wire).await {
                Ok(()) => Status::ok(),
                Err(err) => {
                    warn!(error = %err, "streaming send failed: stream is closed");
                    Status::unknown("streaming send RPC is closed")
                }
            },
        }
    }
}

impl Drop for PacketSender {
    fn drop(&mut self) {
        if let Transport::Streaming { .. } = &self.transport {
            // Dropping `outbound` here (a field of `self.transport`, also
            // being torn down) closes the request stream's sending half;
            // the detached response task keeps running to observe the
            // server's final ack, finalizing the RPC without blocking drop.
            debug!("dropping streaming sender, half-closing send_packets RPC");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_streaming() {
        assert_eq!(PacketSenderMode::default(), PacketSenderMode::Streaming);
    }

    #[test]
    fn default_options_disable_tracing() {
        let options = SenderOptions::default();
        assert_eq!(options.trace_probability, 0.0);
    }
}
