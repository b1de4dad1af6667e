//! Relay WAV sample data into a named pipe.
//!
//! The pipe is opened non-blocking so a missing reader is detected up front
//! (`ENXIO`) instead of hanging the caller forever. Writes that fill the
//! pipe's kernel buffer back off briefly and retry, which paces the relay
//! at roughly the reader's consumption rate.

use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::SpeechError;

/// Canonical RIFF/WAVE header length; everything after is sample data.
pub const WAV_HEADER_LEN: u64 = 44;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Pause after the last write so the reader can drain the pipe buffer
/// before the writing end is closed.
pub const DEFAULT_DRAIN: Duration = Duration::from_secs(5);

const WRITE_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub chunk_size: usize,
    pub drain: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            drain: DEFAULT_DRAIN,
        }
    }
}

/// Stream the sample data of `wav_path` into the FIFO at `pipe_path`.
/// Returns the number of bytes written.
pub fn relay_wav(
    wav_path: &Path,
    pipe_path: &Path,
    options: &RelayOptions,
) -> Result<u64, SpeechError> {
    let meta = std::fs::metadata(pipe_path).map_err(|_| SpeechError::PipeMissing {
        path: pipe_path.to_path_buf(),
    })?;
    if !meta.file_type().is_fifo() {
        return Err(SpeechError::PipeMissing {
            path: pipe_path.to_path_buf(),
        });
    }

    let mut source = open_source(wav_path)?;
    let mut pipe = open_pipe(pipe_path)?;

    let mut buf = vec![0u8; options.chunk_size];
    let mut total: u64 = 0;

    loop {
        let n = source.read(&mut buf).map_err(|source| SpeechError::SourceIo {
            path: wav_path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }

        let mut written = 0;
        while written < n {
            match pipe.write(&buf[written..n]) {
                Ok(0) => {
                    return Err(SpeechError::PipeWrite(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "pipe accepted zero bytes",
                    )))
                }
                Ok(m) => {
                    written += m;
                    total += m as u64;
                }
                // Pipe buffer full: the reader is behind, wait for it.
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Err(SpeechError::NoReader),
                Err(e) => return Err(SpeechError::PipeWrite(e)),
            }
        }
    }

    if !options.drain.is_zero() {
        std::thread::sleep(options.drain);
    }

    info!(bytes = total, "audio relayed to pipe");
    Ok(total)
}

fn open_source(wav_path: &Path) -> Result<File, SpeechError> {
    let mut source = File::open(wav_path).map_err(|source| SpeechError::SourceIo {
        path: wav_path.to_path_buf(),
        source,
    })?;
    source
        .seek(SeekFrom::Start(WAV_HEADER_LEN))
        .map_err(|source| SpeechError::SourceIo {
            path: wav_path.to_path_buf(),
            source,
        })?;
    Ok(source)
}

fn open_pipe(pipe_path: &Path) -> Result<File, SpeechError> {
    match OpenOptions::new()
        .write(true)
        .custom_flags(nix::libc::O_NONBLOCK)
        .open(pipe_path)
    {
        Ok(pipe) => Ok(pipe),
        // ENXIO: FIFO with no reader on the other end.
        Err(e) if e.raw_os_error() == Some(Errno::ENXIO as i32) => Err(SpeechError::NoReader),
        Err(e) => Err(SpeechError::PipeOpen(e)),
    }
}
