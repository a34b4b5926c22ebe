// SPDX-License-Identifier: Apache-2.0

//! Decoded-receiver pipeline (C9): drives an arbitrary frame decoder over a
//! stream of encoded packets pulled from a C8 queue, emitting raw-image
//! packets whose headers carry over, one-to-one and in order, from the
//! frame-head packets that produced them.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use streams_common::{Queue, Status};

use crate::packet::{is_eos, make_eos_packet, Descriptor, Header, Packet, PacketTypeId, Payload, RawImageFormat};

/// One decoded frame handed back by a [`FrameDecoder`].
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub bytes: Bytes,
    pub format: RawImageFormat,
    pub height: i32,
    pub width: i32,
}

/// A frame decoder: fed encoded bytes plus a caps string, yields decoded
/// frames asynchronously and in order. One fed packet may yield zero or one
/// frames; one frame may depend on several fed packets. Implementations may
/// run their own internal worker threads; this trait only defines the seam
/// the driver calls through.
#[async_trait]
pub trait FrameDecoder: Send {
    async fn feed(&mut self, bytes: Bytes, caps: &str) -> Result<(), Status>;

    /// Tells the decoder no more input is coming; already-fed data should
    /// still drain out through `next_frame`.
    async fn signal_eos(&mut self);

    /// Awaits the next decoded frame, or `None` once the decoder has fully
    /// drained after `signal_eos`.
    async fn next_frame(&mut self) -> Option<DecodedFrame>;
}

/// What happens to a decoded frame when the output queue is full. The
/// original behavior (drop, logged) is `DropNewest`; `Block` trades
/// throughput for never losing a frame, for callers that would rather
/// apply back-pressure all the way through the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    #[default]
    DropNewest,
    Block,
}

#[derive(Clone)]
pub struct DecodedReceiverOptions {
    pub output_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for DecodedReceiverOptions {
    fn default() -> Self {
        Self {
            output_capacity: 300,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

fn to_decoder_input(packet: &Packet) -> Result<(Bytes, String), Status> {
    match packet.packet_type_id() {
        PacketTypeId::ControlSignal | PacketTypeId::Unknown => Err(Status::invalid_argument(
            "packet type is not a decodable media payload",
        )),
        _ => {
            let payload = packet
                .payload()
                .ok_or_else(|| Status::invalid_argument("packet has no payload to decode"))?;
            let caps = match &packet.header().descriptor {
                Descriptor::GstreamerCaps(caps) => caps.clone(),
                _ => String::new(),
            };
            Ok((payload.bytes().clone(), caps))
        }
    }
}

struct Driver<D> {
    source: Queue<Packet>,
    decoder: D,
    output: Queue<Packet>,
    overflow_policy: OverflowPolicy,
    pending_headers: VecDeque<Header>,
}

impl<D: FrameDecoder> Driver<D> {
    async fn feed_packet(&mut self, packet: Packet) -> Result<(), Status> {
        if packet.header().flags.is_frame_head() {
            self.pending_headers.push_back(packet.header().clone());
        }
        let (bytes, caps) = to_decoder_input(&packet)?;
        self.decoder.feed(bytes, &caps).await
    }

    fn emit_frame(&mut self, frame: DecodedFrame) {
        let mut header = Header {
            type_id: PacketTypeId::RawImage,
            descriptor: Descriptor::RawImage {
                format: frame.format,
                height: frame.height,
                width: frame.width,
            },
            ..Header::default()
        };
        header.restore_default_flags();
        if let Some(source_header) = self.pending_headers.pop_front() {
            header.carry_over_from(&source_header);
        }
        self.push_output(Packet::from_parts(header, Some(Payload::RawImage(frame.bytes))));
    }

    async fn push_output(&self, packet: Packet) {
        match self.overflow_policy {
            OverflowPolicy::DropNewest => {
                if !self.output.try_push(packet) {
                    warn!("decoded-receiver output queue full, dropping a decoded frame");
                }
            }
            OverflowPolicy::Block => {
                self.output.emplace(packet).await;
            }
        }
    }

    async fn run(&mut self, first_packet: Option<Packet>, first_packet_is_eos: bool) {
        let mut immediate_reason = None;
        if let Some(first) = first_packet {
            if first_packet_is_eos {
                immediate_reason = Some(eos_reason(&first));
                self.decoder.signal_eos().await;
            } else if let Err(status) = self.feed_packet(first).await {
                immediate_reason = Some(format!("decoder feed failed: {status}"));
                self.decoder.signal_eos().await;
            }
        }

        let drain_reason = match immediate_reason {
            Some(reason) => reason,
            None => loop {
                if self.output.handle_count() <= 1 {
                    info!("decoded receiver's consumer dropped its queue share, shutting down");
                    return;
                }
                tokio::select! {
                    frame = self.decoder.next_frame() => {
                        match frame {
                            Some(frame) => self.emit_frame(frame),
                            None => break "decoder drained unexpectedly".to_string(),
                        }
                    }
                    packet = self.source.pop() => {
                        if is_eos(&packet) {
                            self.decoder.signal_eos().await;
                            break eos_reason(&packet);
                        } else if let Err(status) = self.feed_packet(packet).await {
                            self.decoder.signal_eos().await;
                            break format!("decoder feed failed: {status}");
                        }
                    }
                }
            },
        };

        while let Some(frame) = self.decoder.next_frame().await {
            self.emit_frame(frame);
        }
        self.push_output(make_eos_packet(drain_reason)).await;
    }
}

fn eos_reason(packet: &Packet) -> String {
    match &packet.header().descriptor {
        Descriptor::ControlSignal { reason, .. } => reason.clone(),
        _ => String::new(),
    }
}

/// Builds a decoded-receiver pipeline over `source` (typically a C8 queue)
/// and `decoder`, and spawns its driver task. Runs the first-packet probe
/// synchronously: if the first source packet cannot be converted to the
/// decoder's input representation, returns `InvalidArgument` without
/// spawning anything.
pub async fn make_decoded_packet_receiver<D>(
    source: Queue<Packet>,
    decoder: D,
    options: DecodedReceiverOptions,
) -> Result<(Queue<Packet>, tokio::task::JoinHandle<()>), Status>
where
    D: FrameDecoder + Send + Sync + 'static,
{
    let first = source.pop().await;
    let first_is_eos = is_eos(&first);
    if !first_is_eos {
        to_decoder_input(&first)?;
    }

    let output = Queue::new(if options.output_capacity == 0 {
        300
    } else {
        options.output_capacity
    });
    let driver_output = output.clone();

    let mut driver = Driver {
        source,
        decoder,
        output: driver_output,
        overflow_policy: options.overflow_policy,
        pending_headers: VecDeque::new(),
    };

    let handle = tokio::spawn(async move {
        driver.run(Some(first), first_is_eos).await;
    });

    Ok((output, handle))
}
