// SPDX-License-Identifier: Apache-2.0

//! Ingester pipeline (C10, feature `ingester`): assembles a
//! source -> normalize -> (resize) -> sender chain for a media source and
//! blocks until the source depletes. A thin consumer of [`crate::sender`],
//! not core runtime — kept behind a feature so pulling it in doesn't pull in
//! assumptions about where media samples come from.

use async_trait::async_trait;
use tracing::{debug, warn};

use streams_common::Status;

use crate::connection::ConnectionOptions;
use crate::packet::{channels_for_format, make_packet, RawImage, RawImageFormat, Value};
use crate::sender::{PacketSender, SenderOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendCodec {
    /// Passes the source's own codec through unchanged. No validation
    /// against server expectations is performed; preserves the original
    /// ingester's behavior.
    #[default]
    Native,
    H264,
    Jpeg,
    RawRgb,
}

#[derive(Debug, Clone, Copy)]
pub struct ResizeOptions {
    pub height: i32,
    pub width: i32,
}

#[derive(Clone)]
pub struct IngesterOptions {
    pub connection: ConnectionOptions,
    pub send_codec: SendCodec,
    pub resize: Option<ResizeOptions>,
    pub trace_probability: Option<f64>,
}

impl Default for IngesterOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            send_codec: SendCodec::default(),
            resize: None,
            trace_probability: None,
        }
    }
}

/// One sample read from a media source, already shaped as a packable
/// [`Value`]. What produces these (a demuxer, a file reader, a camera
/// capture loop) is the caller's concern; the ingester only drives it.
#[async_trait]
pub trait MediaSource: Send {
    /// Returns the next sample, or `Ok(None)` once the source is exhausted.
    async fn next_sample(&mut self) -> Result<Option<Value>, Status>;
}

fn codec_matches(codec: SendCodec, value: &Value) -> bool {
    match codec {
        SendCodec::Native => true,
        SendCodec::Jpeg => matches!(value, Value::Jpeg(_)),
        SendCodec::RawRgb => matches!(value, Value::RawImage(_)),
        SendCodec::H264 => matches!(value, Value::GstreamerBuffer { caps, .. } if caps.to_ascii_lowercase().contains("h264")),
    }
}

/// Nearest-neighbor resample into a freshly allocated buffer of the target
/// dimensions. Channel count (and therefore stride) is derived from the
/// image's own format, so this never mixes channel layouts.
fn resize_raw_image(image: &RawImage, height: i32, width: i32) -> Result<RawImage, Status> {
    if height == image.height && width == image.width {
        return Ok(image.clone());
    }
    let channels = channels_for_format(image.format)?;
    let mut resized = RawImage::new_buffer(image.format, height, width)?;
    let mut dst = vec![0u8; resized.bytes.len()];

    let src_w = image.width.max(1) as usize;
    let src_h = image.height.max(1) as usize;
    let dst_w = width.max(0) as usize;
    let dst_h = height.max(0) as usize;

    for dy in 0..dst_h {
        let sy = (dy * src_h) / dst_h.max(1);
        for dx in 0..dst_w {
            let sx = (dx * src_w) / dst_w.max(1);
            let src_off = (sy * src_w + sx) * channels;
            let dst_off = (dy * dst_w + dx) * channels;
            if src_off + channels <= image.bytes.len() && dst_off + channels <= dst.len() {
                dst[dst_off..dst_off + channels].copy_from_slice(&image.bytes[src_off..src_off + channels]);
            }
        }
    }
    resized.bytes = bytes::Bytes::from(dst);
    Ok(resized)
}

fn normalize(value: Value, options: &IngesterOptions) -> Result<Value, Status> {
    if !codec_matches(options.send_codec, &value) {
        return Err(Status::invalid_argument(format!(
            "source sample does not match configured send codec {:?}",
            options.send_codec
        )));
    }
    match (value, options.resize) {
        (Value::RawImage(image), Some(resize)) => {
            Ok(Value::RawImage(resize_raw_image(&image, resize.height, resize.width)?))
        }
        (value, _) => Ok(value),
    }
}

/// Runs the ingester to completion: pulls every sample from `source`,
/// normalizes it, and sends it, stopping when the source depletes or a send
/// fails. Returns the first non-`Ok` status encountered, or `Ok` on clean
/// depletion.
pub async fn run_ingester<S>(mut source: S, options: IngesterOptions) -> Status
where
    S: MediaSource,
{
    let sender_options = SenderOptions {
        connection: options.connection.clone(),
        trace_probability: options.trace_probability.unwrap_or(0.0),
        ..SenderOptions::default()
    };
    let mut sender = match PacketSender::connect(sender_options).await {
        Ok(sender) => sender,
        Err(status) => return status,
    };

    let mut sent = 0u64;
    loop {
        let sample = match source.next_sample().await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                debug!(sent, "ingester source depleted");
                return Status::ok();
            }
            Err(status) => {
                warn!(error = %status, "ingester source read failed");
                return status;
            }
        };

        let value = match normalize(sample, &options) {
            Ok(value) => value,
            Err(status) => {
                warn!(error = %status, "ingester sample failed normalization");
                return status;
            }
        };

        let packet = match make_packet(value, None, true) {
            Ok(packet) => packet,
            Err(status) => return status,
        };

        let status = sender.send(packet).await;
        if !status.is_ok() {
            warn!(error = %status, "ingester send failed, stopping");
            return status;
        }
        sent += 1;
    }
}
