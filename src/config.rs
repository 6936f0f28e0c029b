use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use async_openai::types::{ImageModel, ImageQuality, ImageSize, SpeechModel, Voice};

use crate::error::Result;

/// Everything a stage needs to run, built once in `main`.
#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) api_key: String,
    pub(crate) layout: Layout,
    pub(crate) models: Models,
    pub(crate) render: RenderSettings,
}

impl Config {
    pub(crate) fn new(api_key: String, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key,
            layout: Layout::new(work_dir),
            models: Models::default(),
            render: RenderSettings::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("layout", &self.layout)
            .field("models", &self.models)
            .field("render", &self.render)
            .finish()
    }
}

/// Fixed file layout shared by both stages, rooted at the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn generated_text(&self) -> PathBuf {
        self.root.join("GenAI").join("generated_text.txt")
    }

    pub(crate) fn final_video(&self) -> PathBuf {
        self.root.join("GenAI").join("final_video.mp4")
    }

    pub(crate) fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub(crate) fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub(crate) fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    /// `position` is 1-based.
    pub(crate) fn image(&self, position: usize) -> PathBuf {
        self.images_dir().join(format!("image{position}.jpg"))
    }

    pub(crate) fn voiceover(&self, position: usize) -> PathBuf {
        self.audio_dir().join(format!("voiceover{position}.mp3"))
    }

    pub(crate) fn clip(&self, position: usize) -> PathBuf {
        self.videos_dir().join(format!("video{position}.mp4"))
    }

    /// Creates `audio/`, `images/`, `videos/` and the `GenAI/` output folder if absent.
    pub(crate) fn create_media_dirs(&self) -> Result<()> {
        for dir in [self.audio_dir(), self.images_dir(), self.videos_dir()] {
            fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.final_video().parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Models {
    pub(crate) chat: String,
    pub(crate) system_instruction: String,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
    pub(crate) image: ImageModel,
    pub(crate) image_size: ImageSize,
    pub(crate) image_quality: ImageQuality,
    pub(crate) speech: SpeechModel,
    pub(crate) voice: Voice,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            chat: "gpt-4o".to_owned(),
            system_instruction: "You are a helpful assistant that writes clear and concise text on a given topic.".to_owned(),
            max_tokens: 1024,
            temperature: 0.7,
            image: ImageModel::DallE3,
            image_size: ImageSize::S1024x1024,
            image_quality: ImageQuality::HD,
            speech: SpeechModel::Tts1Hd,
            voice: Voice::Alloy,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RenderSettings {
    pub(crate) fps: i32,
    pub(crate) video_codec: String,
    pub(crate) preset: String,
    pub(crate) sample_rate: i32,
    pub(crate) audio_bit_rate: usize,
    /// Fontconfig pattern handed to `drawtext`.
    pub(crate) caption_font: String,
    pub(crate) caption_size: u32,
    pub(crate) caption_outline: u32,
    pub(crate) caption_columns: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 24,
            video_codec: "libx264".to_owned(),
            preset: "medium".to_owned(),
            sample_rate: 44_100,
            audio_bit_rate: 128_000,
            caption_font: "Arial:style=Bold".to_owned(),
            caption_size: 50,
            caption_outline: 2,
            // 950px box at size 50
            caption_columns: 32,
        }
    }
}
