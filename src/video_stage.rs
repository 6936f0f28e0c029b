use std::path::PathBuf;

use tracing::info;

use crate::ai::Backend;
use crate::artifact;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fragment;
use crate::video::{ClipSources, Renderer};

/// Turns the generated text artifact into the final video, one clip per fragment.
///
/// Fragments are processed strictly in order and clips are concatenated in
/// fragment order. Nothing is created on disk when the artifact is missing or
/// holds no fragments.
pub(crate) async fn run(
    config: &Config,
    backend: &dyn Backend,
    renderer: &dyn Renderer,
) -> Result<PathBuf> {
    let layout = &config.layout;
    let source = layout.generated_text();
    let text = artifact::read(&source)?;

    let fragments = fragment::fragments(&text);
    if fragments.is_empty() {
        return Err(Error::NothingToRender { path: source });
    }

    info!("Creating output directories...");
    layout.create_media_dirs()?;

    let total = fragments.len();
    let mut clips = Vec::with_capacity(total);
    for fragment in &fragments {
        let position = fragment.position;
        info!("--- Processing clip {position}/{total} ---");
        info!("Text: {}", fragment.text);

        info!("Generating AI image...");
        let image_path = layout.image(position);
        backend.image(&fragment.text, &image_path).await?;
        info!("Image saved to {}", image_path.display());

        info!("Generating AI voiceover...");
        let audio_path = layout.voiceover(position);
        backend.speech(&fragment.text, &audio_path).await?;
        info!("Audio saved to {}", audio_path.display());

        info!("Assembling video clip...");
        let clip_path = layout.clip(position);
        renderer.assemble_clip(
            &ClipSources {
                image: &image_path,
                audio: &audio_path,
                caption: &fragment.text,
            },
            &clip_path,
        )?;
        info!("Clip saved to {}", clip_path.display());
        clips.push(clip_path);
    }

    info!("--- Creating final video ---");
    let final_path = layout.final_video();
    renderer.concatenate(&clips, &final_path)?;
    info!(
        "Success! The final video has been saved to '{}'",
        final_path.display()
    );
    Ok(final_path)
}
