use std::fs;
use std::future::Future;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, CreateImageRequestArgs,
    CreateSpeechRequestArgs, Image, ImageResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use base64::Engine;
use image::codecs::jpeg;
use tracing::debug;

use crate::config::Models;
use crate::error::{Error, Result, Service};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(300);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const SPEECH_TIMEOUT: Duration = Duration::from_secs(120);

const JPEG_QUALITY: u8 = 95;

/// Hosted generation services used by the two stages.
#[async_trait]
pub(crate) trait Backend: Send + Sync {
    /// Returns the text of the first completion choice.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates one image for `prompt` and stores it as a JPEG at `output_path`.
    async fn image(&self, prompt: &str, output_path: &Path) -> Result<()>;

    /// Synthesizes `text` and stores the MP3 at `output_path`.
    async fn speech(&self, text: &str, output_path: &Path) -> Result<()>;
}

pub(crate) struct OpenAi {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    models: Models,
}

impl OpenAi {
    pub(crate) fn new(api_key: &str, models: Models) -> Self {
        Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
            http: reqwest::Client::new(),
            models,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let service = Service::ImageDownload;
        let response = within(service, DOWNLOAD_TIMEOUT, self.http.get(url).send()).await?;
        let response = response
            .error_for_status()
            .map_err(|err| Error::upstream(service, err))?;
        let bytes = within(service, DOWNLOAD_TIMEOUT, response.bytes()).await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Backend for OpenAi {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let service = Service::Completion;
        let upstream = |err: OpenAIError| Error::upstream(service, err);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.models.chat)
            .max_tokens(self.models.max_tokens)
            .temperature(self.models.temperature)
            .messages([
                ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(self.models.system_instruction.as_str())
                        .build()
                        .map_err(upstream)?,
                ),
                ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(prompt)
                        .build()
                        .map_err(upstream)?,
                ),
            ])
            .build()
            .map_err(upstream)?;

        let response = within(service, COMPLETION_TIMEOUT, self.client.chat().create(request)).await?;
        debug!(choices = response.choices.len(), "completion received");
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::upstream(service, "no content in response from OpenAI"))
    }

    async fn image(&self, prompt: &str, output_path: &Path) -> Result<()> {
        let service = Service::Image;
        let request = CreateImageRequestArgs::default()
            .prompt(prompt)
            .model(self.models.image.clone())
            .n(1)
            .size(self.models.image_size.clone())
            .quality(self.models.image_quality.clone())
            .response_format(ImageResponseFormat::Url)
            .build()
            .map_err(|err| Error::upstream(service, err))?;

        let response = within(service, IMAGE_TIMEOUT, self.client.images().create(request)).await?;
        let image = response
            .data
            .first()
            .ok_or_else(|| Error::upstream(service, "no image in response from OpenAI"))?;

        let bytes = match &**image {
            Image::Url { url, .. } => {
                debug!(%url, "downloading generated image");
                self.download(url).await?
            }
            Image::B64Json { b64_json, .. } => base64::prelude::BASE64_STANDARD
                .decode(b64_json.as_bytes())
                .map_err(|err| Error::upstream(service, err))?,
        };
        save_jpeg(&bytes, output_path)
    }

    async fn speech(&self, text: &str, output_path: &Path) -> Result<()> {
        let service = Service::Speech;
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .voice(self.models.voice.clone())
            .model(self.models.speech.clone())
            .build()
            .map_err(|err| Error::upstream(service, err))?;

        let response = within(service, SPEECH_TIMEOUT, self.client.audio().speech(request)).await?;
        response
            .save(output_path)
            .await
            .map_err(|err| Error::upstream(service, err))
    }
}

async fn within<T, E>(
    service: Service,
    limit: Duration,
    request: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    tokio::time::timeout(limit, request)
        .await
        .map_err(|elapsed| Error::upstream(service, elapsed))?
        .map_err(|err| Error::upstream(service, err))
}

/// The image service answers with PNG, so the bytes are re-encoded to match the `.jpg` name.
fn save_jpeg(bytes: &[u8], output_path: &Path) -> Result<()> {
    let image_buffer = image::load_from_memory(bytes)?.into_rgb8();
    let file = BufWriter::new(fs::File::create(output_path)?);
    let mut encoder = jpeg::JpegEncoder::new_with_quality(file, JPEG_QUALITY);
    encoder.encode(
        &image_buffer,
        image_buffer.width(),
        image_buffer.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn png_bytes_are_stored_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("image1.jpg");

        let source = ImageBuffer::from_pixel(16, 8, Rgb([200_u8, 40, 40]));
        let mut png = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        save_jpeg(&png, &output_path).unwrap();

        let stored = fs::read(&output_path).unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn undecodable_bytes_are_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_jpeg(b"not an image", &dir.path().join("image1.jpg")).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[tokio::test]
    async fn slow_requests_time_out_as_upstream_errors() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, std::io::Error>(())
        };
        let err = within(Service::Speech, Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Upstream {
                service: Service::Speech,
                ..
            }
        ));
    }
}
