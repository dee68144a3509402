//! Streaming BLTE decoding on the write path
//!
//! Archive entries on the CDN are stored BLTE-encoded. [`BlteSink`] sits
//! between the HTTP body and the destination file and decodes each chunk as
//! soon as all of its bytes have arrived, so a ranged download lands on disk
//! already decoded. Malformed input surfaces as a [`BlteError`] from the
//! write that exposed it.
//!
//! Supported chunk modes: `N` (raw), `Z` (zlib) and `4` (LZ4). Encrypted
//! (`E`) and recursive (`F`) chunks are rejected.
//!
//! A headerless stream holding one raw chunk is passed through as it
//! arrives; a headerless compressed chunk is decoded when the stream ends.

mod chunk;
mod error;
mod header;

pub use chunk::{CompressionMode, MAX_CHUNK_SIZE, decode_chunk};
pub use error::{BlteError, BlteResult};
pub use header::{
    BLTE_MAGIC, ChunkInfo, ChunkTable, PREAMBLE_SIZE, Preamble, TableFlags, parse_chunk_table,
    parse_preamble,
};

use async_trait::async_trait;
use bytes::BytesMut;
use std::path::Path;

use crate::checksum::md5_of;
use crate::sink::{ByteSink, FileSink, SinkResult};

#[derive(Debug)]
enum State {
    Preamble,
    Table { header_size: u32 },
    Chunks { chunks: Vec<ChunkInfo>, next: usize },
    /// Header size 0, mode byte not seen yet
    SingleChunk,
    /// Single raw chunk, passed through as it arrives
    RawStream,
    /// Single compressed chunk, decoded once the stream ends
    Buffered,
    Done,
}

/// Incremental BLTE decoder.
///
/// Feed encoded bytes with [`push`](Self::push); decoded output is appended
/// to the caller's buffer whenever a chunk completes.
#[derive(Debug)]
pub struct BlteDecoder {
    buf: BytesMut,
    state: State,
    decoded: u64,
}

impl Default for BlteDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlteDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            state: State::Preamble,
            decoded: 0,
        }
    }

    /// Total decoded bytes produced so far
    pub fn decoded_bytes(&self) -> u64 {
        self.decoded
    }

    /// Accept more encoded bytes
    pub fn push(&mut self, data: &[u8], out: &mut Vec<u8>) -> BlteResult<()> {
        self.buf.extend_from_slice(data);
        self.advance(out)
    }

    /// Signal end of input and emit whatever is still pending
    pub fn finish(&mut self, out: &mut Vec<u8>) -> BlteResult<()> {
        match &self.state {
            State::Done | State::SingleChunk | State::RawStream => {
                self.state = State::Done;
                Ok(())
            }
            State::Buffered => {
                let encoded = self.buf.split();
                let decoded = decode_chunk(0, &encoded)?;
                self.emit(&decoded, out);
                self.state = State::Done;
                Ok(())
            }
            State::Preamble => Err(BlteError::Truncated(format!(
                "{} bytes received, preamble incomplete",
                self.buf.len()
            ))),
            State::Table { header_size } => Err(BlteError::Truncated(format!(
                "chunk table of {header_size} bytes incomplete"
            ))),
            State::Chunks { chunks, next } => Err(BlteError::Truncated(format!(
                "stream ended in chunk {next} of {}",
                chunks.len()
            ))),
        }
    }

    fn emit(&mut self, decoded: &[u8], out: &mut Vec<u8>) {
        self.decoded += decoded.len() as u64;
        out.extend_from_slice(decoded);
    }

    fn advance(&mut self, out: &mut Vec<u8>) -> BlteResult<()> {
        loop {
            match &mut self.state {
                State::Preamble => {
                    if self.buf.len() < PREAMBLE_SIZE {
                        return Ok(());
                    }
                    let preamble = self.buf.split_to(PREAMBLE_SIZE);
                    let header_size = parse_preamble(&preamble)?;
                    self.state = if header_size == 0 {
                        State::SingleChunk
                    } else {
                        State::Table { header_size }
                    };
                }
                State::Table { header_size } => {
                    let header_size = *header_size;
                    let table_len = header_size as usize - PREAMBLE_SIZE;
                    if self.buf.len() < table_len {
                        return Ok(());
                    }
                    let table = self.buf.split_to(table_len);
                    let chunks = parse_chunk_table(&table, header_size)?;
                    self.state = State::Chunks { chunks, next: 0 };
                }
                State::Chunks { chunks, next } => {
                    let index = *next;
                    let size = chunks[index].compressed_size as usize;
                    if self.buf.len() < size {
                        return Ok(());
                    }
                    let encoded = self.buf.split_to(size);
                    let decoded = decode_verified(index, &encoded, &chunks[index])?;
                    if index + 1 == chunks.len() {
                        self.state = State::Done;
                    } else {
                        *next = index + 1;
                    }
                    self.emit(&decoded, out);
                }
                State::SingleChunk => {
                    let Some(&mode) = self.buf.first() else {
                        return Ok(());
                    };
                    if mode == CompressionMode::None as u8 {
                        let _ = self.buf.split_to(1);
                        self.state = State::RawStream;
                    } else {
                        self.state = State::Buffered;
                    }
                }
                State::RawStream => {
                    if !self.buf.is_empty() {
                        let data = self.buf.split();
                        self.emit(&data, out);
                    }
                    return Ok(());
                }
                State::Buffered => return Ok(()),
                State::Done => {
                    return if self.buf.is_empty() {
                        Ok(())
                    } else {
                        Err(BlteError::TrailingData(self.buf.len()))
                    };
                }
            }
        }
    }
}

fn decode_verified(index: usize, encoded: &[u8], info: &ChunkInfo) -> BlteResult<Vec<u8>> {
    let actual = md5_of(encoded);
    if actual != info.checksum {
        return Err(BlteError::ChecksumMismatch {
            chunk: index,
            expected: hex::encode(info.checksum),
            actual: hex::encode(actual),
        });
    }

    let decoded = decode_chunk(index, encoded)?;
    if decoded.len() as u64 != u64::from(info.decompressed_size) {
        return Err(BlteError::SizeMismatch {
            chunk: index,
            expected: u64::from(info.decompressed_size),
            actual: decoded.len() as u64,
        });
    }

    if let Some(expected) = info.decompressed_checksum {
        let actual = md5_of(&decoded);
        if actual != expected {
            return Err(BlteError::ChecksumMismatch {
                chunk: index,
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
    }

    Ok(decoded)
}

/// Sink that BLTE-decodes everything written to it into another sink
#[derive(Debug)]
pub struct BlteSink<S> {
    decoder: BlteDecoder,
    inner: S,
    pending: Vec<u8>,
}

impl BlteSink<FileSink> {
    /// Decoding sink writing to a freshly created file at `path`
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(FileSink::create(path).await?))
    }
}

impl<S> BlteSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            decoder: BlteDecoder::new(),
            inner,
            pending: Vec::new(),
        }
    }

    pub fn decoded_bytes(&self) -> u64 {
        self.decoder.decoded_bytes()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ByteSink + Send> ByteSink for BlteSink<S> {
    async fn write(&mut self, chunk: &[u8]) -> SinkResult<()> {
        self.decoder.push(chunk, &mut self.pending)?;
        if !self.pending.is_empty() {
            self.inner.write(&self.pending).await?;
            self.pending.clear();
        }
        Ok(())
    }

    async fn finish(&mut self) -> SinkResult<()> {
        self.decoder.finish(&mut self.pending)?;
        if !self.pending.is_empty() {
            self.inner.write(&self.pending).await?;
            self.pending.clear();
        }
        self.inner.finish().await
    }
}
