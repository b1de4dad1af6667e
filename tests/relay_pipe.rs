//! End-to-end relay tests against a real FIFO.

use meetbot::speech::relay::{relay_wav, RelayOptions, WAV_HEADER_LEN};
use meetbot::speech::SpeechError;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn write_fixture_wav(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..4096i32 {
        let sample = (i % 256 - 128) as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(-sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn make_fifo(dir: &Path) -> PathBuf {
    let pipe = dir.join("virtmic");
    mkfifo(&pipe, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
    pipe
}

fn no_drain() -> RelayOptions {
    RelayOptions {
        drain: Duration::ZERO,
        ..RelayOptions::default()
    }
}

#[test]
fn relay_without_reader_reports_no_reader() {
    let dir = tempfile::tempdir().unwrap();
    let wav = write_fixture_wav(dir.path());
    let pipe = make_fifo(dir.path());

    let err = relay_wav(&wav, &pipe, &no_drain()).unwrap_err();
    assert!(matches!(err, SpeechError::NoReader));
}

#[test]
fn relay_streams_sample_data_without_wav_header() {
    let dir = tempfile::tempdir().unwrap();
    let wav = write_fixture_wav(dir.path());
    let pipe = make_fifo(dir.path());

    let reader_pipe = pipe.clone();
    let reader = std::thread::spawn(move || {
        let mut file = std::fs::File::open(reader_pipe).unwrap();
        let mut consumed = Vec::new();
        file.read_to_end(&mut consumed).unwrap();
        consumed
    });

    // Give the reader a moment to block on open; the writer side needs a
    // reader present or the non-blocking open fails with ENXIO.
    std::thread::sleep(Duration::from_millis(100));

    let written = relay_wav(&wav, &pipe, &no_drain()).unwrap();
    let consumed = reader.join().unwrap();

    let full = std::fs::read(&wav).unwrap();
    let expected = &full[WAV_HEADER_LEN as usize..];

    assert_eq!(written, expected.len() as u64);
    assert_eq!(consumed, expected);
}

#[test]
fn relay_larger_than_pipe_buffer_completes() {
    // 256 KiB of samples exceeds the default 64 KiB pipe buffer, forcing
    // the non-blocking write path through its backoff-and-retry loop.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..65_536i32 {
        writer.write_sample((i % 512) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let pipe = make_fifo(dir.path());
    let reader_pipe = pipe.clone();
    let reader = std::thread::spawn(move || {
        let mut file = std::fs::File::open(reader_pipe).unwrap();
        let mut consumed = Vec::new();
        file.read_to_end(&mut consumed).unwrap();
        consumed.len()
    });
    std::thread::sleep(Duration::from_millis(100));

    let written = relay_wav(&path, &pipe, &no_drain()).unwrap();
    assert_eq!(reader.join().unwrap() as u64, written);
}
