//! Decoder for the gateway's streaming wire format.
//!
//! The gateway emits newline-delimited `data: <json>` frames where each
//! JSON object carries one of `{content}`, `{done}` or `{error}`. Frames
//! can be split arbitrarily across transport chunks, so the decoder buffers
//! partial lines between feeds. Malformed frames are logged and skipped;
//! they are never fatal.

use serde::Deserialize;
use tracing::warn;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// An incremental content delta.
    Content(String),
    /// Terminal success marker.
    Done,
    /// Terminal error reported by the gateway.
    Error(String),
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    content: Option<String>,
    done: Option<bool>,
    error: Option<String>,
}

/// Incremental decoder over raw transport bytes.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a transport chunk, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(frame) = decode_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn decode_line(line: &[u8]) -> Option<SseFrame> {
    let line = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(err) => {
            warn!(%err, "skipping non-UTF-8 stream line");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    let Some(payload) = line.strip_prefix("data:") else {
        warn!(line, "skipping unrecognized stream line");
        return None;
    };
    match serde_json::from_str::<FramePayload>(payload.trim()) {
        Ok(frame) => {
            if let Some(error) = frame.error {
                Some(SseFrame::Error(error))
            } else if frame.done.unwrap_or(false) {
                Some(SseFrame::Done)
            } else if let Some(content) = frame.content {
                Some(SseFrame::Content(content))
            } else {
                warn!(line, "skipping frame without content, done or error");
                None
            }
        }
        Err(err) => {
            warn!(%err, line, "skipping malformed stream frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_content_and_done_frames() {
        let mut decoder = SseDecoder::new();
        let frames =
            decoder.feed(b"data: {\"content\": \"hello\"}\n\ndata: {\"done\": true}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame::Content("hello".to_string()), SseFrame::Done]
        );
    }

    #[test]
    fn test_reassembles_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"cont").is_empty());
        let frames = decoder.feed(b"ent\": \"ab\"}\n");
        assert_eq!(frames, vec![SseFrame::Content("ab".to_string())]);
    }

    #[test]
    fn test_malformed_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: {not json}\ndata: {\"content\": \"ok\"}\n");
        assert_eq!(frames, vec![SseFrame::Content("ok".to_string())]);
    }

    #[test]
    fn test_error_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: {\"error\": \"quota exceeded\"}\n");
        assert_eq!(frames, vec![SseFrame::Error("quota exceeded".to_string())]);
    }

    #[test]
    fn test_ignores_blank_keepalive_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\n\n").is_empty());
    }
}
