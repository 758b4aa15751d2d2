// WAV track file writer
//
// Append-only 16-bit little-endian PCM writer with a single finalize step.
// The canonical 44-byte header is written up front with size placeholders
// and patched once the total data length is known, so the file is opened
// read-write.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::types::RecorderError;

/// Length of the canonical RIFF/WAVE header
pub const WAV_HEADER_LEN: u64 = 44;

/// Bytes per sample (16-bit PCM)
pub const SAMPLE_WIDTH: u64 = 2;

/// One open WAV output file for one continuous recording segment
pub struct TrackFile {
    writer: BufWriter<File>,
    path: PathBuf,
    data_bytes: u32,
    finalized: bool,
}

impl TrackFile {
    /// Create the file and write the header with size placeholders
    ///
    /// Fails with `FileOpen` if the file cannot be created; `create_new`
    /// guards against clobbering a name picked by the dedup probe.
    pub fn create(path: &Path, channels: u16, sample_rate: u32) -> Result<Self, RecorderError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| RecorderError::FileOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let mut track = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            data_bytes: 0,
            finalized: false,
        };

        let header = wav_header(channels, sample_rate);
        track
            .writer
            .write_all(&header)
            .map_err(|source| track.write_error(source))?;

        Ok(track)
    }

    /// Append one frame of interleaved samples
    pub fn write_frame(&mut self, samples: &[i16]) -> Result<(), RecorderError> {
        for &sample in samples {
            self.writer
                .write_all(&sample.to_le_bytes())
                .map_err(|source| RecorderError::FileWrite {
                    path: self.path.clone(),
                    source,
                })?;
        }
        self.data_bytes += (samples.len() as u32) * SAMPLE_WIDTH as u32;
        Ok(())
    }

    /// Flush, patch the RIFF and data chunk sizes, and close the file
    pub fn finalize(mut self) -> Result<(), RecorderError> {
        self.writer
            .seek(SeekFrom::Start(4))
            .and_then(|_| self.writer.write_all(&(36 + self.data_bytes).to_le_bytes()))
            .and_then(|_| self.writer.seek(SeekFrom::Start(40)))
            .and_then(|_| self.writer.write_all(&self.data_bytes.to_le_bytes()))
            .and_then(|_| self.writer.flush())
            .map_err(|source| RecorderError::FileWrite {
                path: self.path.clone(),
                source,
            })?;

        self.finalized = true;
        Ok(())
    }

    /// Path of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Audio data bytes written so far (header excluded)
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes as u64
    }

    fn write_error(&self, source: std::io::Error) -> RecorderError {
        RecorderError::FileWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for TrackFile {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(
                "track file {} dropped without finalize, header sizes left unpatched",
                self.path.display()
            );
        }
    }
}

/// Canonical 44-byte PCM header with zeroed size fields
fn wav_header(channels: u16, sample_rate: u32) -> Vec<u8> {
    let bit_depth: u16 = (SAMPLE_WIDTH * 8) as u16;
    let byte_rate = sample_rate * channels as u32 * SAMPLE_WIDTH as u32;
    let block_align = channels * SAMPLE_WIDTH as u16;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN as usize);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&[0, 0, 0, 0]); // File size placeholder
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bit_depth.to_le_bytes());

    // data chunk header
    header.extend_from_slice(b"data");
    header.extend_from_slice(&[0, 0, 0, 0]); // Data size placeholder

    header
}
