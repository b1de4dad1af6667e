//! Speech synthesis via espeak-ng, resampled by sox to the format the
//! virtual microphone consumer expects.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

use super::SpeechError;

/// Output format consumed by the virtual microphone reader.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;

pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as a WAV file at `out`.
    fn synthesize(&self, text: &str, out: &Path) -> Result<(), SpeechError>;
}

/// `espeak-ng --stdout | sox - <out>` with a fixed output format.
pub struct EspeakSynthesizer {
    voice_speed: u32,
}

impl EspeakSynthesizer {
    pub fn new(voice_speed: u32) -> Self {
        Self { voice_speed }
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn synthesize(&self, text: &str, out: &Path) -> Result<(), SpeechError> {
        for tool in ["espeak-ng", "sox"] {
            which::which(tool)
                .map_err(|_| SpeechError::Synthesis(format!("`{tool}` not found in PATH")))?;
        }

        info!(chars = text.chars().count(), "synthesizing speech");

        // Text goes in as a plain argument; no shell is involved.
        let mut espeak = Command::new("espeak-ng")
            .arg("-s")
            .arg(self.voice_speed.to_string())
            .arg("--stdout")
            .arg(text)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SpeechError::Synthesis(format!("failed to start espeak-ng: {e}")))?;

        let espeak_out = espeak
            .stdout
            .take()
            .ok_or_else(|| SpeechError::Synthesis("espeak-ng produced no stdout".to_string()))?;

        let sox_status = Command::new("sox")
            .args(["-t", "wav", "-"])
            .args(["-r", &SAMPLE_RATE.to_string()])
            .args(["-c", &CHANNELS.to_string()])
            .args(["-b", &BITS_PER_SAMPLE.to_string()])
            .arg(out)
            .stdin(Stdio::from(espeak_out))
            .stderr(Stdio::null())
            .status()
            .map_err(|e| SpeechError::Synthesis(format!("failed to start sox: {e}")))?;

        let espeak_status = espeak
            .wait()
            .map_err(|e| SpeechError::Synthesis(format!("espeak-ng did not exit: {e}")))?;

        if !espeak_status.success() {
            return Err(SpeechError::Synthesis(format!(
                "espeak-ng exited with {espeak_status}"
            )));
        }
        if !sox_status.success() {
            return Err(SpeechError::Synthesis(format!(
                "sox exited with {sox_status}"
            )));
        }

        validate_format(out)
    }
}

/// Reject output whose format drifted from what the pipe reader expects.
fn validate_format(path: &Path) -> Result<(), SpeechError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| SpeechError::Synthesis(format!("synthesized file is not valid WAV: {e}")))?;
    let spec = reader.spec();

    if spec.sample_rate != SAMPLE_RATE
        || spec.channels != CHANNELS
        || spec.bits_per_sample != BITS_PER_SAMPLE
    {
        return Err(SpeechError::Synthesis(format!(
            "unexpected audio format: {} Hz, {} ch, {} bit",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..32 {
            for _ in 0..channels {
                writer.write_sample(0i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_validate_accepts_expected_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.wav");
        write_wav(&path, SAMPLE_RATE, CHANNELS);
        validate_format(&path).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        write_wav(&path, 44_100, 1);
        let err = validate_format(&path).unwrap_err();
        assert!(matches!(err, SpeechError::Synthesis(_)));
    }

    #[test]
    fn test_validate_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-audio.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(validate_format(&path).is_err());
    }
}
