// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios against an in-process mock `PacketStream` server,
//! covering the receiver's unary/streaming/replay/auto modes and the
//! decoded-receiver header carry-over.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_core::Stream;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Code, Request, Response, Status as TonicStatus, Streaming};

use streams_client::connection::ConnectionOptions;
use streams_client::decoded_receiver::{
    make_decoded_packet_receiver, DecodedFrame, DecodedReceiverOptions, FrameDecoder,
};
use streams_client::packet::{make_packet, Packet as DomainPacket, RawImageFormat, Value};
use streams_client::proto::packet_stream_server::{PacketStream, PacketStreamServer};
use streams_client::proto::{
    OffsetConfig, Packet as WirePacket, ReceiveOnePacketRequest, ReceiveOnePacketResponse,
    ReceivePacketsRequest, ReplayStreamRequest, SendOnePacketResponse, SendPacketsResponse,
};
use streams_client::receiver::{
    Offset, OffsetOptions, PacketReceiver, ReceiverMode, ReceiverOptions, SpecialOffset,
};
use streams_client::receiver_queue::{make_packet_receiver_queue, ReceiverQueueOptions};
use streams_common::StatusKind;

type BoxPacketStream = Pin<Box<dyn Stream<Item = Result<WirePacket, TonicStatus>> + Send>>;

#[derive(Default)]
struct State {
    unary_packet: Option<WirePacket>,
    unary_served: bool,
    stream_packets: Vec<WirePacket>,
    stream_final: Option<(Code, String)>,
    replay_packets: Vec<WirePacket>,
    replay_final: Option<(Code, String)>,
    replay_called: bool,
    last_receive_offset: Option<OffsetConfig>,
    last_replay_offset: Option<OffsetConfig>,
}

struct MockServer {
    state: Arc<Mutex<State>>,
}

fn scripted_stream(packets: Vec<WirePacket>, final_status: Option<(Code, String)>) -> BoxPacketStream {
    let mut items: Vec<Result<WirePacket, TonicStatus>> = packets.into_iter().map(Ok).collect();
    if let Some((code, message)) = final_status {
        items.push(Err(TonicStatus::new(code, message)));
    }
    Box::pin(tokio_stream::iter(items))
}

#[tonic::async_trait]
impl PacketStream for MockServer {
    type ReceivePacketsStream = BoxPacketStream;
    type ReplayStreamStream = BoxPacketStream;

    async fn send_packets(
        &self,
        _request: Request<Streaming<WirePacket>>,
    ) -> Result<Response<SendPacketsResponse>, TonicStatus> {
        Err(TonicStatus::unimplemented("not exercised by these scenarios"))
    }

    async fn send_one_packet(
        &self,
        _request: Request<WirePacket>,
    ) -> Result<Response<SendOnePacketResponse>, TonicStatus> {
        Err(TonicStatus::unimplemented("not exercised by these scenarios"))
    }

    async fn receive_packets(
        &self,
        request: Request<ReceivePacketsRequest>,
    ) -> Result<Response<Self::ReceivePacketsStream>, TonicStatus> {
        let mut state = self.state.lock().unwrap();
        state.last_receive_offset = request.into_inner().offset_config;
        let stream = scripted_stream(state.stream_packets.clone(), state.stream_final.clone());
        Ok(Response::new(stream))
    }

    async fn receive_one_packet(
        &self,
        request: Request<ReceiveOnePacketRequest>,
    ) -> Result<Response<ReceiveOnePacketResponse>, TonicStatus> {
        let mut state = self.state.lock().unwrap();
        state.last_receive_offset = request.into_inner().offset_config;
        if !state.unary_served {
            state.unary_served = true;
            if let Some(packet) = state.unary_packet.clone() {
                return Ok(Response::new(ReceiveOnePacketResponse {
                    valid: true,
                    packet: Some(packet),
                }));
            }
        }
        Ok(Response::new(ReceiveOnePacketResponse {
            valid: false,
            packet: None,
        }))
    }

    async fn replay_stream(
        &self,
        request: Request<ReplayStreamRequest>,
    ) -> Result<Response<Self::ReplayStreamStream>, TonicStatus> {
        let mut state = self.state.lock().unwrap();
        state.replay_called = true;
        state.last_replay_offset = request.into_inner().offset_config;
        let stream = scripted_stream(state.replay_packets.clone(), state.replay_final.clone());
        Ok(Response::new(stream))
    }
}

async fn spawn_server(state: Arc<Mutex<State>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let incoming = TcpListenerStream::new(listener);
    let server = MockServer { state };
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(PacketStreamServer::new(server))
            .serve_with_incoming(incoming)
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

fn string_packet(payload: &str) -> WirePacket {
    let domain: DomainPacket = make_packet(Value::String(bytes::Bytes::from(payload.to_string())), None, false).unwrap();
    domain.into()
}

fn connection(target: String) -> ConnectionOptions {
    ConnectionOptions {
        target,
        stream: "test-stream".to_string(),
        use_insecure_channel: true,
        ssl_domain_name: None,
        ssl_root_cert_path: None,
        token_provider: None,
    }
}

fn payload_string(packet: &DomainPacket) -> String {
    match packet.payload() {
        Some(streams_client::packet::Payload::String(bytes)) => {
            String::from_utf8_lossy(bytes).to_string()
        }
        other => panic!("expected a string payload, found {other:?}"),
    }
}

#[tokio::test]
async fn s1_unary_receive_returns_then_ends() {
    let state = Arc::new(Mutex::new(State {
        unary_packet: Some(string_packet("0")),
        ..Default::default()
    }));
    let target = spawn_server(state).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::UnaryReceive,
        consumer_name: Some("test-consumer".to_string()),
        offset: OffsetOptions {
            reset_offset: true,
            offset: Offset::Special(SpecialOffset::Beginning),
        },
        timeout: Some(std::time::Duration::from_secs(10)),
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let first = receiver.receive().await.unwrap();
    assert_eq!(payload_string(&first), "0");

    let second = receiver.receive().await.unwrap_err();
    assert_eq!(second.kind(), StatusKind::NotFound);
}

#[tokio::test]
async fn s2_streaming_receive_with_seek_position() {
    let state = Arc::new(Mutex::new(State {
        stream_packets: vec![string_packet("seeked")],
        stream_final: Some((Code::Internal, "server failed".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::StreamingReceive,
        offset: OffsetOptions {
            reset_offset: true,
            offset: Offset::Position(1234),
        },
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let first = receiver.receive().await.unwrap();
    assert_eq!(payload_string(&first), "seeked");

    let second = receiver.receive().await.unwrap_err();
    assert_eq!(second.kind(), StatusKind::Internal);
}

#[tokio::test]
async fn s3_replay_with_seek_time() {
    let state = Arc::new(Mutex::new(State {
        replay_packets: vec![string_packet("historical")],
        replay_final: Some((Code::Internal, "server failed".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state.clone()).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::Replay,
        offset: OffsetOptions {
            reset_offset: true,
            offset: Offset::Timestamp(streams_client::packet::Timestamp {
                seconds: 1234,
                nanos: 0,
            }),
        },
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let first = receiver.receive().await.unwrap();
    assert_eq!(payload_string(&first), "historical");
    let second = receiver.receive().await.unwrap_err();
    assert_eq!(second.kind(), StatusKind::Internal);

    let observed = state.lock().unwrap().last_replay_offset.clone().unwrap();
    match observed.offset {
        Some(streams_client::proto::offset_config::Offset::SeekTime(ts)) => {
            let total_nanos = ts.seconds as i128 * 1_000_000_000 + ts.nanos as i128;
            assert_eq!(total_nanos, 1234 * 1_000_000_000);
        }
        other => panic!("expected a seek_time offset, found {other:?}"),
    }
}

#[tokio::test]
async fn s4_auto_mode_falls_back_to_replay() {
    let state = Arc::new(Mutex::new(State {
        stream_final: Some((Code::OutOfRange, "no live data".to_string())),
        replay_packets: vec![
            string_packet("r0"),
            string_packet("r1"),
            string_packet("r2"),
        ],
        replay_final: Some((Code::Internal, "replay exhausted".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::Auto,
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let mut received = Vec::new();
    let result = receiver
        .subscribe(|packet| {
            received.push(payload_string(&packet));
            streams_common::Status::ok()
        })
        .await;

    assert_eq!(received, vec!["r0", "r1", "r2"]);
    assert_eq!(result.kind(), StatusKind::Internal);
}

#[tokio::test]
async fn s5_auto_mode_no_switch_on_non_out_of_range_error() {
    let state = Arc::new(Mutex::new(State {
        stream_final: Some((Code::Internal, "live rpc failed".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state.clone()).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::Auto,
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let result = receiver
        .subscribe(|_packet| streams_common::Status::ok())
        .await;

    assert_eq!(result.kind(), StatusKind::Internal);
    assert!(!state.lock().unwrap().replay_called);
}

#[tokio::test]
async fn s6_subscribe_stops_cleanly_on_cancelled() {
    let state = Arc::new(Mutex::new(State {
        stream_packets: vec![
            string_packet("a"),
            string_packet("b"),
            string_packet("c"),
        ],
        stream_final: Some((Code::Internal, "would have ended here".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state).await;

    let options = ReceiverOptions {
        connection: connection(target),
        mode: ReceiverMode::StreamingReceive,
        ..ReceiverOptions::default()
    };
    let mut receiver = PacketReceiver::connect(options).await.unwrap();

    let mut seen = 0;
    let result = receiver
        .subscribe(|_packet| {
            seen += 1;
            if seen == 2 {
                streams_common::Status::cancelled("caller is done")
            } else {
                streams_common::Status::ok()
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn s7_decoded_receiver_carries_over_two_frame_head_headers() {
    let state = Arc::new(Mutex::new(State {
        stream_packets: vec![string_packet("frame-0"), string_packet("frame-1")],
        stream_final: Some((Code::Internal, "upstream closed".to_string())),
        ..Default::default()
    }));
    let target = spawn_server(state).await;

    let options = ReceiverQueueOptions {
        receiver: ReceiverOptions {
            connection: connection(target),
            mode: ReceiverMode::StreamingReceive,
            ..ReceiverOptions::default()
        },
        ..ReceiverQueueOptions::default()
    };
    let (encoded, _worker) = make_packet_receiver_queue(options).await.unwrap();

    let decoder = PassthroughDecoderState::default();
    let (decoded, _driver) = make_decoded_packet_receiver(
        encoded,
        decoder,
        DecodedReceiverOptions::default(),
    )
    .await
    .unwrap();

    let first = decoded.pop().await;
    let second = decoded.pop().await;
    let third = decoded.pop().await;

    assert_eq!(first.packet_type_id(), streams_client::packet::PacketTypeId::RawImage);
    assert_eq!(second.packet_type_id(), streams_client::packet::PacketTypeId::RawImage);
    assert!(streams_client::packet::is_eos(&third));
}

#[derive(Default)]
struct PassthroughDecoderState {
    pending: std::collections::VecDeque<DecodedFrame>,
    done: bool,
}

#[tonic::async_trait]
impl FrameDecoder for PassthroughDecoderState {
    async fn feed(&mut self, bytes: bytes::Bytes, _caps: &str) -> Result<(), streams_common::Status> {
        self.pending.push_back(DecodedFrame {
            bytes,
            format: RawImageFormat::Unknown,
            height: 1,
            width: 1,
        });
        Ok(())
    }

    async fn signal_eos(&mut self) {
        self.done = true;
    }

    async fn next_frame(&mut self) -> Option<DecodedFrame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.done {
                return None;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

