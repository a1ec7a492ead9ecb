use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::AppError;
use crate::payload::{chunk_count, Markers, Reassembler};

/// Anything that can take one chunk of the framed payload at a time.
pub trait ChunkWriter {
    fn write_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = Result<(), AppError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransmitUpdate {
    Preparing { total_chunks: usize },
    ChunkSent { sent: usize, total: usize },
    Complete { bytes: usize },
}

impl TransmitUpdate {
    pub fn progress(&self) -> f64 {
        match self {
            TransmitUpdate::Preparing { .. } => 0.0,
            TransmitUpdate::ChunkSent { sent, total } => *sent as f64 / *total as f64,
            TransmitUpdate::Complete { .. } => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            chunk_delay: Duration::from_millis(200),
        }
    }
}

/// Writes `payload` in `chunk_size` pieces, waiting `chunk_delay` after each write.
///
/// There is no acknowledgement beyond the write call itself and no retry:
/// the first failed write ends the transfer.
pub async fn transmit<W: ChunkWriter>(
    writer: &mut W,
    payload: &[u8],
    pacing: Pacing,
    progress_tx: &UnboundedSender<TransmitUpdate>,
    cancel_token: &CancellationToken,
) -> Result<usize, AppError> {
    let total = chunk_count(payload.len(), pacing.chunk_size);
    info!(
        "Sending {} bytes in {total} chunks of {}",
        payload.len(),
        pacing.chunk_size
    );
    report(progress_tx, TransmitUpdate::Preparing { total_chunks: total });

    for (index, chunk) in payload.chunks(pacing.chunk_size).enumerate() {
        let sent = index + 1;
        if let Err(e) = writer.write_chunk(chunk).await {
            error!("Write failed on chunk {sent}/{total}: {e}");
            return Err(e);
        }
        debug!("Sent chunk {sent}/{total}");
        report(progress_tx, TransmitUpdate::ChunkSent { sent, total });

        tokio::select! {
            _ = tokio::time::sleep(pacing.chunk_delay) => {}
            _ = cancel_token.cancelled() => {
                info!("Transmission cancelled after {sent}/{total} chunks");
                return Err(AppError::Cancelled);
            }
        }
    }

    info!("Transmission complete");
    report(
        progress_tx,
        TransmitUpdate::Complete {
            bytes: payload.len(),
        },
    );
    Ok(total)
}

fn report(progress_tx: &UnboundedSender<TransmitUpdate>, update: TransmitUpdate) {
    // Nobody listening is fine, the transfer doesn't depend on it
    if progress_tx.send(update).is_err() {
        debug!("Progress receiver dropped");
    }
}

/// Stands in for the dispenser: keeps every chunk and decodes them at the end.
#[derive(Debug)]
pub struct DryRunWriter {
    pub max_chunk: usize,
    reassembler: Reassembler,
}

impl DryRunWriter {
    pub fn new(markers: Markers, max_chunk: usize) -> Self {
        Self {
            max_chunk,
            reassembler: Reassembler::new(markers),
        }
    }

    pub fn into_reassembler(self) -> Reassembler {
        self.reassembler
    }
}

impl ChunkWriter for DryRunWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), AppError> {
        if chunk.len() > self.max_chunk {
            return Err(AppError::DryRunMismatch(format!(
                "chunk of {} bytes exceeds {}",
                chunk.len(),
                self.max_chunk
            )));
        }
        self.reassembler.push(chunk);
        Ok(())
    }
}
