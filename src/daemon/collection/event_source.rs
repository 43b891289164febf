use std::{fmt::Display, io};

use anyhow::Result;
use clap::ValueEnum;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::{
    bytes::{Buf, BytesMut},
    codec::{Decoder, FramedRead, LinesCodec, LinesCodecError},
    sync::CancellationToken,
};
use tracing::{debug, info, warn};

use crate::daemon::tracking::event::BrowserEvent;

/// Largest event that is decoded. Bigger frames are skipped without being buffered.
const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// Length prefix of a native message.
const NATIVE_HEADER_LENGTH: usize = 4;

/// How events are separated in the input stream.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One json object per line.
    #[default]
    Lines,
    /// Native messaging framing: every message is prefixed by its length as a native-endian u32.
    Native,
}

impl Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Lines => write!(f, "lines"),
            Framing::Native => write!(f, "native"),
        }
    }
}

/// Decodes [BrowserEvent]s from a byte stream and sends them to the scheduler. Frames that can't
/// be decoded are skipped.
pub struct EventSource<R> {
    reader: R,
    framing: Framing,
    next: mpsc::Sender<BrowserEvent>,
    shutdown: CancellationToken,
}

impl<R: AsyncRead + Unpin> EventSource<R> {
    pub fn new(
        reader: R,
        framing: Framing,
        next: mpsc::Sender<BrowserEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader,
            framing,
            next,
            shutdown,
        }
    }

    /// Runs until the input ends, the scheduler stops listening or shutdown is requested.
    pub async fn run(self) -> Result<()> {
        match self.framing {
            Framing::Lines => {
                let codec = SkippingLinesCodec::new(MAX_FRAME_LENGTH);
                forward(FramedRead::new(self.reader, codec), self.next, self.shutdown).await
            }
            Framing::Native => {
                let codec = NativeMessageCodec::new(MAX_FRAME_LENGTH);
                forward(FramedRead::new(self.reader, codec), self.next, self.shutdown).await
            }
        }
    }
}

/// [LinesCodec] that turns a line over the limit into an empty frame. A decoding error would end
/// the [FramedRead] for good.
struct SkippingLinesCodec(LinesCodec);

impl SkippingLinesCodec {
    fn new(max_length: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_length))
    }

    fn skip_oversized(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<String>, LinesCodecError> {
        match result {
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("Skipping event line longer than {MAX_FRAME_LENGTH} bytes");
                Ok(Some(String::new()))
            }
            other => other,
        }
    }
}

impl Decoder for SkippingLinesCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        Self::skip_oversized(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        Self::skip_oversized(self.0.decode_eof(src))
    }
}

/// Native messaging framing: a native-endian `u32` length followed by the message. Messages over
/// `max_length` are dropped as they arrive and show up as a single empty frame.
struct NativeMessageCodec {
    max_length: usize,
    /// Bytes of an oversized message that haven't arrived yet.
    skipping: usize,
}

impl NativeMessageCodec {
    fn new(max_length: usize) -> Self {
        Self {
            max_length,
            skipping: 0,
        }
    }
}

impl Decoder for NativeMessageCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        if self.skipping > 0 {
            let dropped = self.skipping.min(src.len());
            src.advance(dropped);
            self.skipping -= dropped;
            return Ok((self.skipping == 0).then(BytesMut::new));
        }

        if src.len() < NATIVE_HEADER_LENGTH {
            return Ok(None);
        }
        let mut header = [0u8; NATIVE_HEADER_LENGTH];
        header.copy_from_slice(&src[..NATIVE_HEADER_LENGTH]);
        let length = u32::from_ne_bytes(header) as usize;

        if length > self.max_length {
            warn!("Skipping native message of {length} bytes");
            src.advance(NATIVE_HEADER_LENGTH);
            self.skipping = length;
            return self.decode(src);
        }

        let frame_length = NATIVE_HEADER_LENGTH + length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }
        src.advance(NATIVE_HEADER_LENGTH);
        Ok(Some(src.split_to(length)))
    }
}

async fn forward<B, E>(
    mut frames: impl Stream<Item = Result<B, E>> + Unpin,
    next: mpsc::Sender<BrowserEvent>,
    shutdown: CancellationToken,
) -> Result<()>
where
    B: AsRef<[u8]>,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = frames.next() => frame,
        };

        let bytes = match frame {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!("Failed to read event frame: {e}");
                continue;
            }
            None => {
                info!("Event stream ended");
                return Ok(());
            }
        };

        let bytes = bytes.as_ref();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<BrowserEvent>(bytes) {
            Ok(event) => {
                debug!("Received {event:?}");
                if next.send(event).await.is_err() {
                    debug!("Scheduler stopped listening");
                    return Ok(());
                }
            }
            Err(e) => warn!(
                "Skipping invalid event {}: {e}",
                String::from_utf8_lossy(bytes)
            ),
        }
    }
}
