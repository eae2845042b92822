//! Provider doubles with call counters, configurable failures and panics.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use lexora::config::VoiceSettings;
use lexora::storage::filesystem::write_file;
use lexora::{LipSyncComposer, SpeechSynthesizer, StageError};

pub const MOCK_AUDIO: &[u8] = b"mock-mp3-audio";
pub const MOCK_VIDEO: &[u8] = b"mock-mp4-video";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

pub struct MockSpeech {
    behaviour: Behaviour,
    configured: bool,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    started: AtomicUsize,
    voices: Mutex<Vec<String>>,
    texts: Mutex<Vec<String>>,
}

impl MockSpeech {
    fn build(behaviour: Behaviour, configured: bool, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            configured,
            gate,
            calls: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            voices: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Self::build(behaviour, true, None)
    }

    pub fn unconfigured() -> Arc<Self> {
        Self::build(Behaviour::Succeed, false, None)
    }

    /// Succeeds, but only after a permit is added to `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Self::build(Behaviour::Succeed, true, Some(gate))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    /// Waits until `count` synthesize calls have begun.
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..500 {
            if self.started() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("speech mock never reached {} calls", count);
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        _settings: &VoiceSettings,
        output: &Path,
    ) -> Result<(), StageError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().push(voice_id.to_string());
        self.texts.lock().unwrap().push(text.to_string());

        match self.behaviour {
            Behaviour::Succeed => {
                write_file(output, MOCK_AUDIO).await?;
                Ok(())
            }
            Behaviour::Fail => Err(StageError::Status {
                status: 429,
                body: "quota exceeded".to_string(),
            }),
            Behaviour::Panic => panic!("speech mock panicked"),
        }
    }
}

pub struct MockLipSync {
    behaviour: Behaviour,
    configured: bool,
    calls: AtomicUsize,
    images: Mutex<Vec<(PathBuf, Option<Vec<u8>>)>>,
    audio_inputs: Mutex<Vec<Option<Vec<u8>>>>,
}

impl MockLipSync {
    fn build(behaviour: Behaviour, configured: bool) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            configured,
            calls: AtomicUsize::new(0),
            images: Mutex::new(Vec::new()),
            audio_inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Self::build(behaviour, true)
    }

    pub fn unconfigured() -> Arc<Self> {
        Self::build(Behaviour::Succeed, false)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Image paths passed to `compose`, with their content at call time.
    pub fn images(&self) -> Vec<(PathBuf, Option<Vec<u8>>)> {
        self.images.lock().unwrap().clone()
    }

    /// Audio content seen at call time.
    pub fn audio_inputs(&self) -> Vec<Option<Vec<u8>>> {
        self.audio_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl LipSyncComposer for MockLipSync {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn compose(&self, audio: &Path, image: &Path, output: &Path) -> Result<(), StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images
            .lock()
            .unwrap()
            .push((image.to_path_buf(), std::fs::read(image).ok()));
        self.audio_inputs
            .lock()
            .unwrap()
            .push(std::fs::read(audio).ok());

        match self.behaviour {
            Behaviour::Succeed => {
                write_file(output, MOCK_VIDEO).await?;
                Ok(())
            }
            Behaviour::Fail => Err(StageError::MissingResult),
            Behaviour::Panic => panic!("lip-sync mock panicked"),
        }
    }
}
