//! In-process stand-ins for the hosted services and the media renderer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ai::Backend;
use crate::error::{Error, Result, Service};
use crate::video::{ClipSources, Renderer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Complete(String),
    Image(String, PathBuf),
    Speech(String, PathBuf),
}

pub(crate) struct FakeBackend {
    completion: String,
    fail_completion: bool,
    fail_image_at: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub(crate) fn new(completion: &str) -> Self {
        Self {
            completion: completion.to_owned(),
            fail_completion: false,
            fail_image_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_completion(mut self) -> Self {
        self.fail_completion = true;
        self
    }

    /// Fails the `nth` image request, counting from 1.
    pub(crate) fn failing_image_at(mut self, nth: usize) -> Self {
        self.fail_image_at = Some(nth);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls
            .iter()
            .filter(|call| matches!(call, Call::Image(..)))
            .count()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.record(Call::Complete(prompt.to_owned()));
        if self.fail_completion {
            return Err(Error::upstream(Service::Completion, "rate limit exceeded"));
        }
        Ok(self.completion.clone())
    }

    async fn image(&self, prompt: &str, output_path: &Path) -> Result<()> {
        let images = self.record(Call::Image(prompt.to_owned(), output_path.to_path_buf()));
        if self.fail_image_at == Some(images) {
            return Err(Error::upstream(Service::Image, "content policy violation"));
        }
        fs::write(output_path, b"jpeg")?;
        Ok(())
    }

    async fn speech(&self, text: &str, output_path: &Path) -> Result<()> {
        self.record(Call::Speech(text.to_owned(), output_path.to_path_buf()));
        fs::write(output_path, b"mp3")?;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRenderer {
    fail_concatenation: bool,
    assembled: Mutex<Vec<(String, PathBuf)>>,
    concatenated: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
}

impl FakeRenderer {
    pub(crate) fn failing_concatenation() -> Self {
        Self {
            fail_concatenation: true,
            ..Self::default()
        }
    }

    pub(crate) fn assembled(&self) -> Vec<(String, PathBuf)> {
        self.assembled.lock().unwrap().clone()
    }

    pub(crate) fn concatenated(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.concatenated.lock().unwrap().clone()
    }
}

impl Renderer for FakeRenderer {
    fn assemble_clip(&self, sources: &ClipSources<'_>, output_path: &Path) -> Result<()> {
        assert!(sources.image.exists(), "image must exist before assembly");
        assert!(sources.audio.exists(), "audio must exist before assembly");
        self.assembled
            .lock()
            .unwrap()
            .push((sources.caption.to_owned(), output_path.to_path_buf()));
        fs::write(output_path, b"mp4")?;
        Ok(())
    }

    fn concatenate(&self, clips: &[PathBuf], output_path: &Path) -> Result<()> {
        if self.fail_concatenation {
            return Err(Error::encoding("muxer rejected the stream"));
        }
        self.concatenated
            .lock()
            .unwrap()
            .push((clips.to_vec(), output_path.to_path_buf()));
        fs::write(output_path, b"mp4")?;
        Ok(())
    }
}
