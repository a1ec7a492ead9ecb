//! Wire framing for the dispenser: `#START#<json array>#END#`.

use thiserror::Error;
use tracing::debug;

use crate::medication::Medication;

pub const START_MARKER: &str = "#START#";
pub const END_MARKER: &str = "#END#";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to encode medication data: {0}")]
    Encode(serde_json::Error),
    #[error("Failed to decode medication data: {0}")]
    Decode(serde_json::Error),
    #[error("Payload doesn't begin with {0}")]
    MissingStart(String),
    #[error("Payload never ended with {0}")]
    MissingEnd(String),
    #[error("Data after the end marker ({0} bytes)")]
    TrailingData(usize),
    #[error("Medication data contains the end marker {0}")]
    MarkerInBody(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub start: String,
    pub end: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: START_MARKER.into(),
            end: END_MARKER.into(),
        }
    }
}

/// Wraps the compact JSON encoding of `medications` in the markers.
pub fn encode(medications: &[Medication], markers: &Markers) -> Result<Vec<u8>, FrameError> {
    let json = serde_json::to_vec(medications).map_err(FrameError::Encode)?;
    // The receiver stops at the first end marker it sees
    let end = markers.end.as_bytes();
    if !end.is_empty() && json.windows(end.len()).any(|window| window == end) {
        return Err(FrameError::MarkerInBody(markers.end.clone()));
    }
    let mut payload = Vec::with_capacity(markers.start.len() + json.len() + markers.end.len());
    payload.extend_from_slice(markers.start.as_bytes());
    payload.extend_from_slice(&json);
    payload.extend_from_slice(markers.end.as_bytes());
    Ok(payload)
}

/// Inverse of [`encode`] for a complete payload.
pub fn decode(payload: &[u8], markers: &Markers) -> Result<Vec<Medication>, FrameError> {
    let body = payload
        .strip_prefix(markers.start.as_bytes())
        .ok_or_else(|| FrameError::MissingStart(markers.start.clone()))?;
    let body = body
        .strip_suffix(markers.end.as_bytes())
        .ok_or_else(|| FrameError::MissingEnd(markers.end.clone()))?;
    serde_json::from_slice(body).map_err(FrameError::Decode)
}

/// Number of writes needed for `len` bytes.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

/// Receiving end of a chunked transfer, the way the dispenser sees it.
#[derive(Debug, Default)]
pub struct Reassembler {
    markers: Markers,
    buffer: Vec<u8>,
    chunks: usize,
}

impl Reassembler {
    pub fn new(markers: Markers) -> Self {
        Self {
            markers,
            buffer: Vec::new(),
            chunks: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.chunks += 1;
        self.buffer.extend_from_slice(chunk);
        debug!(
            "Reassembler got chunk {} ({} bytes, {} total)",
            self.chunks,
            chunk.len(),
            self.buffer.len()
        );
    }

    pub fn chunks_received(&self) -> usize {
        self.chunks
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// True once the buffer holds the end marker.
    pub fn is_complete(&self) -> bool {
        self.end_position().is_some()
    }

    fn end_position(&self) -> Option<usize> {
        let end = self.markers.end.as_bytes();
        self.buffer
            .windows(end.len())
            .position(|window| window == end)
            .map(|pos| pos + end.len())
    }

    /// Decodes the collected payload.
    pub fn finish(&self) -> Result<Vec<Medication>, FrameError> {
        if !self.buffer.starts_with(self.markers.start.as_bytes()) {
            return Err(FrameError::MissingStart(self.markers.start.clone()));
        }
        let end = self
            .end_position()
            .ok_or_else(|| FrameError::MissingEnd(self.markers.end.clone()))?;
        if end != self.buffer.len() {
            return Err(FrameError::TrailingData(self.buffer.len() - end));
        }
        decode(&self.buffer, &self.markers)
    }
}
