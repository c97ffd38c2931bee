//! Streaming wire-format decoder.
//!
//! The endpoint streams newline-delimited frames prefixed `data: `; the
//! literal frame body `[DONE]` closes the sequence. The decoder buffers
//! transport chunks, splits complete lines, and parses each frame into one
//! [`DeltaEvent`]. A malformed frame aborts the sequence with a decode
//! error rather than being silently skipped.

use crate::error::CompletionError;
use crate::wire::{DeltaEvent, DeltaFrame};

/// Frame marker prefix.
pub const DATA_PREFIX: &str = "data:";

/// Terminal frame body.
pub const DONE_MARKER: &str = "[DONE]";

/// Incremental decoder over raw transport bytes.
///
/// Feed each arriving chunk to [`push`](Self::push); complete frames are
/// returned in arrival order. Once the terminal marker is seen the decoder
/// is finished and further input is ignored.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: String,
    finished: bool,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminal marker has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes a transport chunk and returns the completed delta events.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Decode` on a frame that is neither a
    /// `data: ` frame nor the terminal marker, or whose body is not valid
    /// frame JSON.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<DeltaEvent>, CompletionError> {
        if self.finished {
            return Ok(Vec::new());
        }

        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_frame(line)? {
                None => {
                    self.finished = true;
                    break;
                }
                Some(event) => events.push(event),
            }
        }

        Ok(events)
    }
}

/// Parses one non-blank frame line.
///
/// # Returns
///
/// - `Ok(Some(event))`: A content-bearing frame
/// - `Ok(None)`: The terminal `[DONE]` marker
/// - `Err(_)`: A malformed frame
fn parse_frame(line: &str) -> Result<Option<DeltaEvent>, CompletionError> {
    let Some(body) = line.strip_prefix(DATA_PREFIX) else {
        return Err(CompletionError::Decode(format!(
            "frame missing data prefix: {line:?}"
        )));
    };
    let body = body.trim_start();

    if body == DONE_MARKER {
        return Ok(None);
    }

    let frame: DeltaFrame = serde_json::from_str(body)
        .map_err(|err| CompletionError::Decode(format!("unparseable frame body: {err}")))?;
    Ok(Some(DeltaEvent::from(frame)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::FinishReason;

    fn frame(content: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}},\"finish_reason\":null}}]}}\n")
    }

    #[test]
    fn test_decodes_frames_in_order() {
        let mut decoder = SseFrameDecoder::new();
        let input = format!(
            "{}{}data: {{\"choices\":[{{\"delta\":{{}},\"finish_reason\":\"stop\"}}]}}\n",
            frame("Hel"),
            frame("lo")
        );

        let events = decoder.push(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].content.as_deref(), Some("Hel"));
        assert_eq!(events[1].content.as_deref(), Some("lo"));
        assert_eq!(events[2].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_buffers_partial_lines_across_chunks() {
        let mut decoder = SseFrameDecoder::new();
        let full = frame("Hello");
        let (head, tail) = full.split_at(20);

        assert!(decoder.push(head.as_bytes()).unwrap().is_empty());
        let events = decoder.push(tail.as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let mut decoder = SseFrameDecoder::new();
        let input = format!("\n\n{}\n", frame("Hi"));
        let events = decoder.push(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_done_marker_closes_the_sequence() {
        let mut decoder = SseFrameDecoder::new();
        let input = format!("{}data: [DONE]\n{}", frame("Hi"), frame("after"));

        let events = decoder.push(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(decoder.is_finished());

        // input after the terminal marker is ignored, not an error
        assert!(decoder.push(frame("more").as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frame_aborts_with_decode_error() {
        let mut decoder = SseFrameDecoder::new();
        let err = decoder.push(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, CompletionError::Decode(_)));

        let mut decoder = SseFrameDecoder::new();
        let err = decoder.push(b"event: noise\n").unwrap_err();
        assert!(matches!(err, CompletionError::Decode(_)));
    }
}
