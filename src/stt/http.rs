//! HTTP transcription gateway.
//!
//! Talks to a local ASR service over a small REST surface:
//!
//! * `POST {base}/transcribe` — multipart upload of the WAV recording,
//!   response `{"text": "..."}`.
//! * `GET {base}/health` — readiness probe used by [`Transcriber::warm_up`].
//!
//! The sample-rate contract is enforced *locally* by parsing the WAV header
//! before anything goes on the wire — a mismatched recording is a programming
//! error in the capture path and must not depend on the service to detect.

use std::time::Duration;

use crate::audio::wav;
use crate::config::SttServiceConfig;

use super::{SttError, Transcriber};

// ---------------------------------------------------------------------------
// HttpTranscriber
// ---------------------------------------------------------------------------

/// Blocking HTTP client for the speech-recognition service.
pub struct HttpTranscriber {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTranscriber {
    /// Build a transcriber for the service at `base_url` with a per-request
    /// timeout.  A default client is used as a last-resort fallback if the
    /// builder fails (should never happen in practice).
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from application config.
    pub fn from_config(config: &SttServiceConfig) -> Self {
        Self::new(&config.base_url, config.timeout_secs)
    }
}

impl Transcriber for HttpTranscriber {
    /// Upload the WAV buffer and return the transcript.
    ///
    /// Returns an empty string when the service found no speech segments.
    fn transcribe(&self, wav_bytes: &[u8]) -> Result<String, SttError> {
        if wav_bytes.is_empty() {
            return Ok(String::new());
        }

        let rate = wav::wav_sample_rate(wav_bytes).ok_or(SttError::InvalidWav)?;
        if rate != wav::SAMPLE_RATE {
            return Err(SttError::SampleRate { actual: rate });
        }

        let part = reqwest::blocking::multipart::Part::bytes(wav_bytes.to_vec())
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Request(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| SttError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SttError::Engine(format!("HTTP {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .map_err(|e| SttError::Engine(format!("bad response: {e}")))?;

        Ok(body["text"].as_str().unwrap_or_default().trim().to_string())
    }

    /// Poll the service health endpoint once; success means the model is
    /// loaded and requests will be served.
    fn warm_up(&self) -> Result<(), SttError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .map_err(|e| SttError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SttError::Engine(format!("HTTP {}", response.status())))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::encode_wav;

    fn transcriber() -> HttpTranscriber {
        // Port 9 (discard) — nothing listens there; tests below never reach
        // the network anyway.
        HttpTranscriber::new("http://127.0.0.1:9/", 1)
    }

    #[test]
    fn base_url_is_normalised() {
        assert_eq!(transcriber().base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn empty_buffer_short_circuits_to_empty_text() {
        let text = transcriber().transcribe(&[]).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn invalid_wav_is_rejected_before_any_request() {
        let result = transcriber().transcribe(b"definitely not a wav header");
        assert!(matches!(result, Err(SttError::InvalidWav)));
    }

    #[test]
    fn wrong_sample_rate_is_rejected_before_any_request() {
        let mut wav = encode_wav(&[0u8; 64]);
        // Patch the header's sample-rate field to 44.1 kHz.
        wav[24..28].copy_from_slice(&44_100u32.to_le_bytes());

        let result = transcriber().transcribe(&wav);
        assert!(matches!(
            result,
            Err(SttError::SampleRate { actual: 44_100 })
        ));
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _t = HttpTranscriber::from_config(&SttServiceConfig::default());
    }
}
