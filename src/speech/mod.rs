//! Text-to-speech pipeline: synthesize speech into a WAV file, then relay
//! the raw samples into the named pipe backing the virtual microphone.

pub mod relay;
pub mod synth;

pub use relay::{relay_wav, RelayOptions};
pub use synth::{EspeakSynthesizer, SpeechSynthesizer};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("failed to read synthesized audio {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio pipe {path} does not exist or is not a FIFO")]
    PipeMissing { path: PathBuf },

    #[error("no process is reading from the audio pipe")]
    NoReader,

    #[error("failed to open audio pipe: {0}")]
    PipeOpen(#[source] std::io::Error),

    #[error("failed to write to audio pipe: {0}")]
    PipeWrite(#[source] std::io::Error),
}

/// Synthesis plus relay as one operation, offloaded to a blocking thread.
pub struct SpeechPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    pipe_path: PathBuf,
    relay: RelayOptions,
}

impl SpeechPipeline {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer,
            pipe_path: pipe_path.into(),
            relay: RelayOptions::default(),
        }
    }

    /// Speak `text` into the virtual microphone. Returns the number of
    /// sample bytes relayed.
    pub async fn speak(&self, text: &str) -> Result<u64, SpeechError> {
        let synthesizer = self.synthesizer.clone();
        let pipe_path = self.pipe_path.clone();
        let options = self.relay.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let wav_path = temp_wav_path();
            synthesizer.synthesize(&text, &wav_path)?;
            info!(wav = %wav_path.display(), "speech synthesized, relaying to pipe");

            let result = relay_wav(&wav_path, &pipe_path, &options);
            // The intermediate file is scratch either way.
            let _ = std::fs::remove_file(&wav_path);
            result
        })
        .await
        .map_err(|e| SpeechError::Synthesis(format!("speech task failed: {e}")))?
    }
}

fn temp_wav_path() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%.3f");
    std::env::temp_dir().join(format!("meetbot-speech-{stamp}.wav"))
}
