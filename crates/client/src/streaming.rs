//! Stream Chunk Decoder
//!
//! Turns the raw body of an advance stream into `StreamChunk`s. Accepts both
//! SSE (`data: {...}` lines, other SSE fields ignored) and newline-delimited
//! JSON. A `[DONE]` payload ends the stream.

use crate::types::{ClientError, ClientResult, StreamChunk};

/// Incremental line decoder for advance streams.
#[derive(Debug, Default)]
pub struct StreamChunkDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl StreamChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes. Returns every chunk completed by them.
    ///
    /// Lines are split on raw bytes so multi-byte characters spanning two
    /// network reads decode correctly.
    pub fn push(&mut self, bytes: &[u8]) -> ClientResult<Vec<StreamChunk>> {
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            if self.done {
                continue;
            }
            if let Some(chunk) = self.decode_line(&line)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Decode whatever remains after the body ended without a final newline.
    pub fn finish(&mut self) -> ClientResult<Vec<StreamChunk>> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.decode_line(&rest)?.into_iter().collect())
    }

    fn decode_line(&mut self, raw: &[u8]) -> ClientResult<Option<StreamChunk>> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| ClientError::stream(format!("Invalid UTF-8 in stream: {}", e)))?;
        let trimmed = line.trim();

        let payload = if let Some(rest) = trimmed.strip_prefix("data:") {
            rest.trim_start()
        } else if trimmed.starts_with('{') {
            trimmed
        } else {
            // event:, id:, retry:, comments, blank keep-alives
            return Ok(None);
        };

        if payload.is_empty() {
            return Ok(None);
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        serde_json::from_str(payload)
            .map(Some)
            .map_err(|e| ClientError::stream(format!("Malformed stream chunk: {}", e)))
    }
}
