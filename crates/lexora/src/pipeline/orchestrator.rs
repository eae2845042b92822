use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info_span, Instrument};

use crate::config::VoiceSettings;
use crate::providers::{LipSyncComposer, SpeechSynthesizer};
use crate::sanitize;

use super::error::GenerationFailure;

/// Inputs for one narrated video.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub lesson_text: String,
    pub voice_id: String,
    pub avatar_image: PathBuf,
    pub output_video: PathBuf,
    pub output_audio: PathBuf,
}

/// Locations of both artifacts after a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifacts {
    pub video: PathBuf,
    pub audio: PathBuf,
}

/// Runs speech synthesis, then lip-sync composition on the produced audio.
///
/// Composition needs the audio artifact, so the stages never overlap and a
/// synthesis failure skips composition entirely.
#[derive(Clone)]
pub struct VideoGenerator {
    speech: Arc<dyn SpeechSynthesizer>,
    lipsync: Arc<dyn LipSyncComposer>,
    voice_settings: VoiceSettings,
}

impl VideoGenerator {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        lipsync: Arc<dyn LipSyncComposer>,
        voice_settings: VoiceSettings,
    ) -> Self {
        Self {
            speech,
            lipsync,
            voice_settings,
        }
    }

    /// Name of the first provider lacking a credential, if any.
    pub fn missing_provider(&self) -> Option<&'static str> {
        if !self.speech.is_configured() {
            Some("speech")
        } else if !self.lipsync.is_configured() {
            Some("lip-sync")
        } else {
            None
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifacts, GenerationFailure> {
        self.speech
            .synthesize(
                &request.lesson_text,
                &request.voice_id,
                &self.voice_settings,
                &request.output_audio,
            )
            .instrument(info_span!(
                "stage",
                stage = "synthesize",
                text = %sanitize::text_summary(&request.lesson_text),
                voice_id = %request.voice_id,
            ))
            .await
            .map_err(GenerationFailure::Audio)?;

        debug!(
            audio = %sanitize::redact_path(&request.output_audio),
            "Audio ready, starting composition"
        );

        self.lipsync
            .compose(
                &request.output_audio,
                &request.avatar_image,
                &request.output_video,
            )
            .instrument(info_span!(
                "stage",
                stage = "compose",
                avatar = %sanitize::redact_path(&request.avatar_image),
            ))
            .await
            .map_err(GenerationFailure::Video)?;

        Ok(GeneratedArtifacts {
            video: request.output_video.clone(),
            audio: request.output_audio.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StageError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSpeech {
        fail: bool,
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String, VoiceSettings)>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        fn is_configured(&self) -> bool {
            true
        }

        async fn synthesize(
            &self,
            text: &str,
            voice_id: &str,
            settings: &VoiceSettings,
            output: &Path,
        ) -> Result<(), StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((text.to_string(), voice_id.to_string(), *settings));
            if self.fail {
                return Err(StageError::Status {
                    status: 500,
                    body: "tts down".to_string(),
                });
            }
            std::fs::write(output, b"audio").unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLipSync {
        fail: bool,
        calls: AtomicUsize,
        audio_existed: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl LipSyncComposer for FakeLipSync {
        fn is_configured(&self) -> bool {
            true
        }

        async fn compose(
            &self,
            audio: &Path,
            _image: &Path,
            output: &Path,
        ) -> Result<(), StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.audio_existed.lock().unwrap() = Some(audio.exists());
            if self.fail {
                return Err(StageError::MissingResult);
            }
            std::fs::write(output, b"video").unwrap();
            Ok(())
        }
    }

    fn request(dir: &TempDir) -> GenerationRequest {
        GenerationRequest {
            lesson_text: "Ownership moves values.".to_string(),
            voice_id: "voice-1".to_string(),
            avatar_image: dir.path().join("avatar.png"),
            output_video: dir.path().join("video.mp4"),
            output_audio: dir.path().join("audio.mp3"),
        }
    }

    #[tokio::test]
    async fn test_generate_runs_both_stages_in_order() {
        let dir = TempDir::new().unwrap();
        let speech = Arc::new(FakeSpeech::default());
        let lipsync = Arc::new(FakeLipSync::default());
        let settings = VoiceSettings {
            stability: 0.3,
            similarity_boost: 0.9,
        };
        let generator = VideoGenerator::new(speech.clone(), lipsync.clone(), settings);

        let artifacts = generator.generate(&request(&dir)).await.unwrap();

        assert_eq!(artifacts.video, dir.path().join("video.mp4"));
        assert_eq!(artifacts.audio, dir.path().join("audio.mp3"));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lipsync.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*lipsync.audio_existed.lock().unwrap(), Some(true));

        let seen = speech.seen.lock().unwrap();
        assert_eq!(seen[0].0, "Ownership moves values.");
        assert_eq!(seen[0].1, "voice-1");
        assert_eq!(seen[0].2, settings);
    }

    #[tokio::test]
    async fn test_speech_failure_short_circuits() {
        let dir = TempDir::new().unwrap();
        let speech = Arc::new(FakeSpeech {
            fail: true,
            ..FakeSpeech::default()
        });
        let lipsync = Arc::new(FakeLipSync::default());
        let generator =
            VideoGenerator::new(speech.clone(), lipsync.clone(), VoiceSettings::default());

        let failure = generator.generate(&request(&dir)).await.unwrap_err();

        assert!(matches!(failure, GenerationFailure::Audio(_)));
        assert!(failure.to_string().starts_with("audio generation failed"));
        assert_eq!(failure.stage(), "synthesize");
        assert_eq!(lipsync.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lipsync_failure_is_tagged() {
        let dir = TempDir::new().unwrap();
        let speech = Arc::new(FakeSpeech::default());
        let lipsync = Arc::new(FakeLipSync {
            fail: true,
            ..FakeLipSync::default()
        });
        let generator = VideoGenerator::new(speech, lipsync, VoiceSettings::default());

        let failure = generator.generate(&request(&dir)).await.unwrap_err();

        assert_eq!(
            failure.to_string(),
            "lip-sync video failed: provider returned no result"
        );
        assert_eq!(failure.stage(), "compose");
    }
}
