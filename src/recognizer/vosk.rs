use super::{pcm_bytes_to_samples, Hypothesis, SpeechDecoder, SpeechEngine};
use crate::config::RecognizerConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{info, warn};
use vosk::{CompleteResult, DecodingState, Model, Recognizer};

/// Process-wide Vosk engine. The model is loaded once at startup and shared
/// read-only; each pipeline cycle gets its own `Recognizer` on top of it.
pub struct VoskEngine {
    model: Arc<Model>,
    sample_rate: f32,
}

impl VoskEngine {
    pub fn load(config: &RecognizerConfig) -> Result<Self> {
        if (config.sample_rate - 16000.0).abs() > 0.1 {
            warn!(
                "Recognizer sample rate {}Hz differs from the 16000Hz the transcoder produces",
                config.sample_rate
            );
        }

        info!("Loading Vosk model from {}", config.model_path);
        let model = Model::new(&config.model_path)
            .ok_or_else(|| anyhow!("Failed to load Vosk model from '{}'", config.model_path))?;

        Ok(Self {
            model: Arc::new(model),
            sample_rate: config.sample_rate,
        })
    }
}

impl SpeechEngine for VoskEngine {
    fn name(&self) -> &str {
        "vosk"
    }

    fn new_decoder(&self) -> Result<Box<dyn SpeechDecoder>> {
        let mut recognizer = Recognizer::new(&self.model, self.sample_rate).ok_or_else(|| {
            anyhow!(
                "Failed to create Vosk recognizer at {}Hz",
                self.sample_rate
            )
        })?;
        recognizer.set_words(true);

        Ok(Box::new(VoskDecoder {
            recognizer,
            carry: None,
        }))
    }
}

pub struct VoskDecoder {
    recognizer: Recognizer,
    carry: Option<u8>,
}

impl SpeechDecoder for VoskDecoder {
    fn accept_pcm(&mut self, pcm: &[u8]) -> Result<Hypothesis> {
        let samples = pcm_bytes_to_samples(&mut self.carry, pcm);

        let state = self
            .recognizer
            .accept_waveform(&samples)
            .map_err(|e| anyhow!("Vosk waveform acceptance failed: {:?}", e))?;

        match state {
            DecodingState::Finalized => {
                let text = match self.recognizer.result() {
                    CompleteResult::Single(single) => single.text.to_string(),
                    CompleteResult::Multiple(multiple) => multiple
                        .alternatives
                        .first()
                        .map(|alt| alt.text.to_string())
                        .unwrap_or_default(),
                };
                Ok(Hypothesis::Final(text))
            }
            DecodingState::Running => Ok(Hypothesis::Partial(
                self.recognizer.partial_result().partial.to_string(),
            )),
            DecodingState::Failed => Err(anyhow!("Vosk recognition failed for current chunk")),
        }
    }
}
