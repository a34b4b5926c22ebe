// SPDX-License-Identifier: Apache-2.0

//! Raw packet receiver (C7): unary polling, live server-streaming receive,
//! historical replay, or an Auto mode that starts live and transparently
//! falls back to replay.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use streams_common::{Status, StatusKind};

use crate::connection::{apply_rpc_options, ConnectionOptions, RpcOptions};
use crate::packet::{Packet, Timestamp};
use crate::proto::offset_config::Offset as WireOffset;
use crate::proto::packet_stream_client::PacketStreamClient;
use crate::proto::{
    OffsetConfig, Packet as WirePacket, ReceiveOnePacketRequest, ReceivePacketsRequest,
    ReplayStreamRequest, SpecialOffset as WireSpecialOffset,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialOffset {
    Beginning,
    End,
}

#[derive(Debug, Clone)]
pub enum Offset {
    Special(SpecialOffset),
    Position(i64),
    Timestamp(Timestamp),
}

impl Default for Offset {
    fn default() -> Self {
        Offset::Special(SpecialOffset::Beginning)
    }
}

/// Tagged-union offset selector, translated onto the wire `OffsetConfig`
/// oneof. Ignored entirely (no offset override sent) unless `reset_offset`
/// is set.
#[derive(Debug, Clone, Default)]
pub struct OffsetOptions {
    pub reset_offset: bool,
    pub offset: Offset,
}

fn offset_config_wire(options: &OffsetOptions) -> Option<OffsetConfig> {
    if !options.reset_offset {
        return None;
    }
    let offset = match &options.offset {
        Offset::Special(SpecialOffset::Beginning) => {
            WireOffset::SpecialOffset(WireSpecialOffset::Beginning as i32)
        }
        Offset::Special(SpecialOffset::End) => {
            WireOffset::SpecialOffset(WireSpecialOffset::End as i32)
        }
        Offset::Position(position) => WireOffset::SeekPosition(*position),
        Offset::Timestamp(ts) => WireOffset::SeekTime(crate::proto::Timestamp {
            seconds: ts.seconds,
            nanos: ts.nanos,
        }),
    };
    Some(OffsetConfig {
        offset: Some(offset),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverMode {
    UnaryReceive,
    StreamingReceive,
    Replay,
    Auto,
}

#[derive(Clone)]
pub struct ReceiverOptions {
    pub connection: ConnectionOptions,
    pub rpc_options: RpcOptions,
    pub mode: ReceiverMode,
    pub consumer_name: Option<String>,
    pub offset: OffsetOptions,
    /// Sleep between calls in `UnaryReceive` mode's `subscribe` loop.
    pub poll_interval: Duration,
    /// Forwarded as the wire `timeout_ms` for streaming/replay modes, and
    /// bounds the unary RPC deadline (further bounded by
    /// `rpc_options.timeout`) for `UnaryReceive`.
    pub timeout: Option<Duration>,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            rpc_options: RpcOptions::default(),
            mode: ReceiverMode::StreamingReceive,
            consumer_name: None,
            offset: OffsetOptions::default(),
            poll_interval: Duration::from_millis(500),
            timeout: None,
        }
    }
}

fn random_consumer_name() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn timeout_ms(timeout: Option<Duration>) -> i64 {
    timeout.map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// `UnaryReceive`'s RPC deadline: `options.timeout`, bounded by the
/// connection's `RpcOptions.timeout` when both are set. `None` if
/// `options.timeout` is absent; `apply_rpc_options` alone then governs the
/// deadline.
fn unary_deadline(options: &ReceiverOptions) -> Option<Duration> {
    match (options.timeout, options.rpc_options.timeout) {
        (Some(requested), Some(bound)) => Some(requested.min(bound)),
        (Some(requested), None) => Some(requested),
        (None, _) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoFixed {
    Streaming,
    Replay,
}

enum Transport {
    Unary {
        client: PacketStreamClient<crate::connection::StreamChannel>,
        consumed_first_offset: bool,
    },
    Streaming {
        stream: tonic::Streaming<WirePacket>,
    },
    Replay {
        stream: tonic::Streaming<WirePacket>,
    },
    Auto {
        /// Kept so Replay can be opened lazily, on the first `OutOfRange`
        /// read, rather than unconditionally at construction: `ReplayStream`
        /// must never be called if the live stream never falls back.
        client: PacketStreamClient<crate::connection::StreamChannel>,
        streaming: Option<tonic::Streaming<WirePacket>>,
        replay: Option<tonic::Streaming<WirePacket>>,
        fixed: Option<AutoFixed>,
    },
}

pub struct PacketReceiver {
    options: ReceiverOptions,
    consumer_name: String,
    transport: Transport,
}

async fn next_from_stream(stream: &mut tonic::Streaming<WirePacket>) -> Result<Packet, Status> {
    match stream.message().await {
        Ok(Some(wire)) => Packet::try_from(wire),
        Ok(None) => Err(Status::unknown("stream ended")),
        Err(status) => Err(Status::from(status)),
    }
}

impl PacketReceiver {
    pub async fn connect(options: ReceiverOptions) -> Result<Self, Status> {
        let channel = options.connection.connect().await?;
        let mut client = PacketStreamClient::new(channel);
        let consumer_name = options
            .consumer_name
            .clone()
            .unwrap_or_else(random_consumer_name);

        let transport = match options.mode {
            ReceiverMode::UnaryReceive => Transport::Unary {
                client,
                consumed_first_offset: false,
            },
            ReceiverMode::StreamingReceive => {
                let request = Self::streaming_request(&options, &consumer_name);
                let stream = client
                    .receive_packets(apply_rpc_options(request, options.rpc_options))
                    .await
                    .map_err(Status::from)?
                    .into_inner();
                Transport::Streaming { stream }
            }
            ReceiverMode::Replay => {
                let request = Self::replay_request(&options, &consumer_name);
                let stream = client
                    .replay_stream(apply_rpc_options(request, options.rpc_options))
                    .await
                    .map_err(Status::from)?
                    .into_inner();
                Transport::Replay { stream }
            }
            ReceiverMode::Auto => {
                let streaming_request = Self::streaming_request(&options, &consumer_name);
                let streaming = client
                    .receive_packets(apply_rpc_options(streaming_request, options.rpc_options))
                    .await
                    .map_err(Status::from)?
                    .into_inner();
                Transport::Auto {
                    client,
                    streaming: Some(streaming),
                    replay: None,
                    fixed: None,
                }
            }
        };

        Ok(Self {
            options,
            consumer_name,
            transport,
        })
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    fn streaming_request(
        options: &ReceiverOptions,
        consumer_name: &str,
    ) -> tonic::Request<ReceivePacketsRequest> {
        tonic::Request::new(ReceivePacketsRequest {
            consumer_name: consumer_name.to_string(),
            offset_config: offset_config_wire(&options.offset),
            timeout_ms: timeout_ms(options.timeout),
        })
    }

    fn replay_request(
        options: &ReceiverOptions,
        consumer_name: &str,
    ) -> tonic::Request<ReplayStreamRequest> {
        tonic::Request::new(ReplayStreamRequest {
            consumer_name: consumer_name.to_string(),
            offset_config: offset_config_wire(&options.offset),
            timeout_ms: timeout_ms(options.timeout),
        })
    }

    async fn receive_unary(
        client: &mut PacketStreamClient<crate::connection::StreamChannel>,
        options: &ReceiverOptions,
        consumer_name: &str,
        consumed_first_offset: &mut bool,
    ) -> Result<Packet, Status> {
        let offset_config = if !*consumed_first_offset {
            offset_config_wire(&options.offset)
        } else {
            None
        };
        *consumed_first_offset = true;

        let request = tonic::Request::new(ReceiveOnePacketRequest {
            blocking: false,
            consumer_name: consumer_name.to_string(),
            offset_config,
        });
        let mut request = apply_rpc_options(request, options.rpc_options);
        if let Some(deadline) = unary_deadline(options) {
            request.set_timeout(deadline);
        }
        let response = client
            .receive_one_packet(request)
            .await
            .map_err(Status::from)?
            .into_inner();
        if !response.valid {
            return Err(Status::not_found("no packet currently available"));
        }
        Packet::try_from(response.packet.unwrap_or_default())
    }

    /// One-shot receive. Unary mode returns `NotFound` when the response
    /// carries `valid=false`.
    pub async fn receive(&mut self) -> Result<Packet, Status> {
        match &mut self.transport {
            Transport::Unary {
                client,
                consumed_first_offset,
            } => {
                Self::receive_unary(client, &self.options, &self.consumer_name, consumed_first_offset)
                    .await
            }
            Transport::Streaming { stream } => next_from_stream(stream).await,
            Transport::Replay { stream } => next_from_stream(stream).await,
            Transport::Auto {
                client,
                streaming,
                replay,
                fixed,
            } => match fixed {
                Some(AutoFixed::Streaming) => match streaming.as_mut() {
                    Some(stream) => next_from_stream(stream).await,
                    None => Err(Status::internal("auto receiver fixed to streaming with no stream open")),
                },
                Some(AutoFixed::Replay) => match replay.as_mut() {
                    Some(stream) => next_from_stream(stream).await,
                    None => Err(Status::internal("auto receiver fixed to replay with no stream open")),
                },
                None => {
                    let Some(stream) = streaming.as_mut() else {
                        return Err(Status::internal("auto receiver has no streaming rpc open"));
                    };
                    let first = next_from_stream(stream).await;
                    if matches!(&first, Err(status) if status.kind() == StatusKind::OutOfRange) {
                        info!("auto-mode receiver falling back to replay after OutOfRange");
                        *fixed = Some(AutoFixed::Replay);
                        *streaming = None;
                        let request = Self::replay_request(&self.options, &self.consumer_name);
                        match client
                            .replay_stream(apply_rpc_options(request, self.options.rpc_options))
                            .await
                            .map_err(Status::from)
                        {
                            Ok(response) => {
                                let mut stream = response.into_inner();
                                let result = next_from_stream(&mut stream).await;
                                *replay = Some(stream);
                                result
                            }
                            Err(status) => Err(status),
                        }
                    } else {
                        debug!("auto-mode receiver fixing to streaming after first read");
                        *fixed = Some(AutoFixed::Streaming);
                        first
                    }
                }
            },
        }
    }

    /// Loops `receive` into `callback`. Stops when the callback returns
    /// `Cancelled`; logs any other callback error and continues. In
    /// `UnaryReceive` mode, a `NotFound` receive (no packet currently
    /// queued) is treated as a polling miss, not a terminal error: the loop
    /// sleeps `poll_interval` and tries again.
    pub async fn subscribe<F>(&mut self, mut callback: F) -> Status
    where
        F: FnMut(Packet) -> Status,
    {
        loop {
            match self.receive().await {
                Ok(packet) => {
                    let status = callback(packet);
                    if status.kind() == StatusKind::Cancelled {
                        return Status::ok();
                    }
                    if !status.is_ok() {
                        warn!(status = %status, "subscribe callback returned a non-cancelling error");
                    }
                }
                Err(status)
                    if self.options.mode == ReceiverMode::UnaryReceive
                        && status.kind() == StatusKind::NotFound => {}
                Err(status) => return status,
            }
            if self.options.mode == ReceiverMode::UnaryReceive {
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_config_absent_without_reset() {
        let options = OffsetOptions {
            reset_offset: false,
            offset: Offset::Position(5),
        };
        assert!(offset_config_wire(&options).is_none());
    }

    #[test]
    fn offset_config_carries_special_offset() {
        let options = OffsetOptions {
            reset_offset: true,
            offset: Offset::Special(SpecialOffset::Beginning),
        };
        let wire = offset_config_wire(&options).unwrap();
        assert_eq!(
            wire.offset,
            Some(WireOffset::SpecialOffset(WireSpecialOffset::Beginning as i32))
        );
    }

    #[test]
    fn offset_config_carries_seek_time_in_nanos() {
        let options = OffsetOptions {
            reset_offset: true,
            offset: Offset::Timestamp(Timestamp {
                seconds: 1234,
                nanos: 0,
            }),
        };
        let wire = offset_config_wire(&options).unwrap();
        match wire.offset {
            Some(WireOffset::SeekTime(ts)) => assert_eq!(ts.seconds, 1234),
            other => panic!("unexpected offset: {other:?}"),
        }
    }

    #[test]
    fn random_consumer_name_has_expected_length() {
        assert_eq!(random_consumer_name().len(), 8);
    }

    #[test]
    fn unary_deadline_is_bounded_by_rpc_options_timeout() {
        let mut options = ReceiverOptions {
            timeout: Some(Duration::from_secs(30)),
            ..ReceiverOptions::default()
        };
        options.rpc_options.timeout = Some(Duration::from_secs(5));
        assert_eq!(unary_deadline(&options), Some(Duration::from_secs(5)));
    }

    #[test]
    fn unary_deadline_falls_back_to_receive_timeout_alone() {
        let options = ReceiverOptions {
            timeout: Some(Duration::from_secs(10)),
            ..ReceiverOptions::default()
        };
        assert_eq!(unary_deadline(&options), Some(Duration::from_secs(10)));
    }

    #[test]
    fn unary_deadline_absent_when_receive_timeout_unset() {
        let mut options = ReceiverOptions::default();
        options.rpc_options.timeout = Some(Duration::from_secs(5));
        assert_eq!(unary_deadline(&options), None);
    }
}
