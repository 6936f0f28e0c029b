use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ffmpeg::format::context::{Input, Output};
use ffmpeg::util::frame::{audio::Audio, video::Video};
use ffmpeg_next::{
    self as ffmpeg, channel_layout, codec, decoder, encoder, filter, format, media, picture,
    rescale, Dictionary, Packet, Rational,
};
use image::RgbImage;
use tracing::debug;

use crate::config::RenderSettings;
use crate::error::{Error, Result};

const SILENCE_CHUNK: i64 = 1024;

static INIT: OnceLock<std::result::Result<(), ffmpeg::Error>> = OnceLock::new();

pub(crate) fn init() -> Result<()> {
    INIT.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        Ok(())
    })
    .clone()
    .map_err(Error::from)
}

/// Inputs of one clip: the still, its voiceover and the caption drawn over it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClipSources<'a> {
    pub(crate) image: &'a Path,
    pub(crate) audio: &'a Path,
    pub(crate) caption: &'a str,
}

pub(crate) trait Renderer {
    /// Shows the image with the caption for exactly as long as the voiceover lasts.
    fn assemble_clip(&self, sources: &ClipSources<'_>, output_path: &Path) -> Result<()>;

    /// Joins `clips` in the given order. Clips of different sizes are centered
    /// on a canvas as large as the largest one.
    fn concatenate(&self, clips: &[PathBuf], output_path: &Path) -> Result<()>;
}

pub(crate) struct FfmpegRenderer {
    settings: RenderSettings,
}

impl FfmpegRenderer {
    pub(crate) fn new(settings: RenderSettings) -> Result<Self> {
        init()?;
        Ok(Self { settings })
    }
}

impl Renderer for FfmpegRenderer {
    fn assemble_clip(&self, sources: &ClipSources<'_>, output_path: &Path) -> Result<()> {
        assemble(&self.settings, sources, output_path)
    }

    fn concatenate(&self, clips: &[PathBuf], output_path: &Path) -> Result<()> {
        concatenate(&self.settings, clips, output_path)
    }
}

/// Greedy word wrap. A word longer than `columns` gets a line of its own.
pub(crate) fn wrap_caption(text: &str, columns: usize) -> String {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > columns {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// Escapes an option value for use inside a filtergraph description: first for
/// the option parser, then for the graph parser.
pub(crate) fn escape_filter_value(value: &str) -> String {
    let option = escape(value, &['\\', '\'', ':']);
    escape(&option, &['\\', '\'', ',', ';', '[', ']'])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn drawtext(settings: &RenderSettings, caption: &str) -> String {
    format!(
        "drawtext=font={font}:text={text}:expansion=none:fontsize={size}:fontcolor=white\
         :borderw={outline}:bordercolor=black:text_align=C:x=(w-text_w)/2:y=(h-text_h)/2",
        font = escape_filter_value(&settings.caption_font),
        text = escape_filter_value(&wrap_caption(caption, settings.caption_columns)),
        size = settings.caption_size,
        outline = settings.caption_outline,
    )
}

/// Smallest even-sized canvas that holds every frame size.
fn canvas(sizes: &[(u32, u32)]) -> (u32, u32) {
    let (width, height) = sizes
        .iter()
        .fold((2, 2), |(w, h), &(width, height)| (w.max(width), h.max(height)));
    (round_up_even(width), round_up_even(height))
}

fn round_up_even(value: u32) -> u32 {
    value + (value & 1)
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}

/// Frames needed to show a still for `duration` seconds; never zero.
fn clip_frame_count(duration: f64, fps: i32) -> i64 {
    ((duration * f64::from(fps)).ceil() as i64).max(1)
}

/// Audio samples covering `frames` video frames.
fn samples_for_frames(frames: i64, fps: i32, sample_rate: i32) -> i64 {
    ceil_div(frames * i64::from(sample_rate), i64::from(fps))
}

/// Video frames covering `samples` audio samples.
fn frames_for_samples(samples: i64, fps: i32, sample_rate: i32) -> i64 {
    ceil_div(samples * i64::from(fps), i64::from(sample_rate))
}

fn missing_filter(name: &str) -> Error {
    Error::encoding(format!("failed to get filter {name}"))
}

fn pixel_format_id(pixel: format::Pixel) -> i32 {
    ffmpeg::ffi::AVPixelFormat::from(pixel) as i32
}

fn rgb_frame(still: &RgbImage) -> Video {
    let mut frame = Video::new(format::Pixel::RGB24, still.width(), still.height());
    let stride = frame.stride(0);
    let row = still.width() as usize * 3;
    let data = frame.data_mut(0);
    for (y, pixels) in still.as_raw().chunks_exact(row).enumerate() {
        data[y * stride..y * stride + row].copy_from_slice(pixels);
    }
    frame
}

fn video_graph(args: &str, spec: &str) -> Result<filter::Graph> {
    let mut filter_graph = filter::Graph::new();
    filter_graph.add(
        &filter::find("buffer").ok_or_else(|| missing_filter("buffer"))?,
        "in",
        args,
    )?;
    filter_graph.add(
        &filter::find("buffersink").ok_or_else(|| missing_filter("buffersink"))?,
        "out",
        "",
    )?;
    {
        let mut out = filter_graph
            .get("out")
            .ok_or_else(|| missing_filter("out"))?;
        out.set_pixel_format(format::Pixel::YUV420P);
    }
    filter_graph.output("in", 0)?.input("out", 0)?.parse(spec)?;
    filter_graph.validate()?;
    debug!("video filter graph: {}", filter_graph.dump());
    Ok(filter_graph)
}

/// `source_args` describes the frames fed into the graph; the sink produces
/// frames the encoder accepts, cut to its frame size when `chunked`.
fn audio_graph(
    source_args: &str,
    encoder: &encoder::Audio,
    chunked: bool,
) -> Result<filter::Graph> {
    let mut filter_graph = filter::Graph::new();
    filter_graph.add(
        &filter::find("abuffer").ok_or_else(|| missing_filter("abuffer"))?,
        "in",
        source_args,
    )?;
    filter_graph.add(
        &filter::find("abuffersink").ok_or_else(|| missing_filter("abuffersink"))?,
        "out",
        "",
    )?;
    {
        let mut out = filter_graph
            .get("out")
            .ok_or_else(|| missing_filter("out"))?;
        out.set_sample_format(encoder.format());
        out.set_channel_layout(encoder.channel_layout());
        out.set_sample_rate(encoder.rate());
    }
    filter_graph.output("in", 0)?.input("out", 0)?.parse("anull")?;
    filter_graph.validate()?;
    debug!("audio filter graph: {}", filter_graph.dump());

    if chunked {
        if let Some(codec) = encoder.codec() {
            if !codec
                .capabilities()
                .contains(codec::capabilities::Capabilities::VARIABLE_FRAME_SIZE)
            {
                filter_graph
                    .get("out")
                    .ok_or_else(|| missing_filter("out"))?
                    .sink()
                    .set_frame_size(encoder.frame_size());
            }
        }
    }
    Ok(filter_graph)
}

fn stream_time_base(output: &Output, index: usize) -> Result<Rational> {
    Ok(output
        .stream(index)
        .ok_or(ffmpeg::Error::StreamNotFound)?
        .time_base())
}

/// Encodes frames at a constant frame rate; one pts step per frame.
struct VideoEncoder {
    stream_index: usize,
    encoder: encoder::Video,
    time_base: Rational,
    next_pts: i64,
    last_frame: Option<Video>,
}

impl VideoEncoder {
    fn new(
        output: &mut Output,
        settings: &RenderSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);
        let codec = encoder::find_by_name(&settings.video_codec)
            .or_else(|| encoder::find(codec::Id::H264))
            .ok_or(ffmpeg::Error::EncoderNotFound)?;
        let time_base = Rational(1, settings.fps);

        let mut output_stream = output.add_stream(codec)?;
        let stream_index = output_stream.index();
        let mut encoder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_aspect_ratio(Rational(1, 1));
        encoder.set_format(format::Pixel::YUV420P);
        encoder.set_frame_rate(Some(Rational(settings.fps, 1)));
        encoder.set_time_base(time_base);
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        opts.set("preset", &settings.preset);
        let opened_encoder = encoder.open_with(opts)?;
        output_stream.set_parameters(&opened_encoder);
        output_stream.set_time_base(time_base);

        Ok(Self {
            stream_index,
            encoder: opened_encoder,
            time_base,
            next_pts: 0,
            last_frame: None,
        })
    }

    fn send(&mut self, frame: &mut Video, output: &mut Output) -> Result<()> {
        frame.set_pts(Some(self.next_pts));
        frame.set_kind(picture::Type::None);
        self.encoder.send_frame(frame)?;
        self.next_pts += 1;
        self.receive_and_process_encoded_packets(output)
    }

    fn push(&mut self, mut frame: Video, output: &mut Output) -> Result<()> {
        self.send(&mut frame, output)?;
        self.last_frame = Some(frame);
        Ok(())
    }

    /// Repeats the last frame until `frames` frames have been sent.
    fn hold_until(&mut self, frames: i64, output: &mut Output) -> Result<()> {
        if let Some(mut frame) = self.last_frame.take() {
            while self.next_pts < frames {
                self.send(&mut frame, output)?;
            }
            self.last_frame = Some(frame);
        }
        Ok(())
    }

    fn finish(&mut self, output: &mut Output) -> Result<()> {
        self.encoder.send_eof()?;
        self.receive_and_process_encoded_packets(output)
    }

    fn receive_and_process_encoded_packets(&mut self, output: &mut Output) -> Result<()> {
        let output_time_base = stream_time_base(output, self.stream_index)?;
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, output_time_base);
            packet.write_interleaved(output)?;
        }
        Ok(())
    }
}

/// AAC encoder behind a graph that cuts incoming audio into encoder-sized frames.
struct AudioEncoder {
    stream_index: usize,
    encoder: encoder::Audio,
    chunker: filter::Graph,
    time_base: Rational,
    /// Samples handed to the chunker so far.
    next_pts: i64,
}

impl AudioEncoder {
    fn new(output: &mut Output, settings: &RenderSettings) -> Result<Self> {
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);
        let codec = encoder::find(codec::Id::AAC)
            .ok_or(ffmpeg::Error::EncoderNotFound)?
            .audio()?;
        let time_base = Rational(1, settings.sample_rate);

        let mut output_stream = output.add_stream(codec)?;
        let stream_index = output_stream.index();
        let context = codec::context::Context::from_parameters(output_stream.parameters())?;
        let mut encoder = context.encoder().audio()?;
        if global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let channel_layout = codec
            .channel_layouts()
            .map(|layouts| layouts.best(2))
            .unwrap_or(channel_layout::ChannelLayout::STEREO);
        encoder.set_channel_layout(channel_layout);
        encoder.set_rate(settings.sample_rate);
        encoder.set_format(
            codec
                .formats()
                .ok_or_else(|| Error::encoding("unknown supported sample formats"))?
                .next()
                .ok_or_else(|| Error::encoding("failed to get sample format"))?,
        );
        encoder.set_bit_rate(settings.audio_bit_rate);
        encoder.set_time_base(time_base);
        output_stream.set_time_base(time_base);

        let opened_encoder = encoder.open_as(codec)?;
        output_stream.set_parameters(&opened_encoder);

        let source_args = format!(
            "time_base={}:sample_rate={}:sample_fmt={}:channel_layout=0x{:x}",
            time_base,
            opened_encoder.rate(),
            opened_encoder.format().name(),
            opened_encoder.channel_layout().bits()
        );
        let chunker = audio_graph(&source_args, &opened_encoder, true)?;

        Ok(Self {
            stream_index,
            encoder: opened_encoder,
            chunker,
            time_base,
            next_pts: 0,
        })
    }

    /// `frame` must already be in the encoder's sample format, rate and layout.
    fn push(&mut self, frame: &mut Audio, output: &mut Output) -> Result<()> {
        frame.set_pts(Some(self.next_pts));
        self.next_pts += frame.samples() as i64;
        self.chunker
            .get("in")
            .ok_or_else(|| missing_filter("in"))?
            .source()
            .add(frame)?;
        self.receive_and_process_filtered_frames(output)
    }

    /// Appends silence until `samples` samples have been pushed.
    fn pad_until(&mut self, samples: i64, output: &mut Output) -> Result<()> {
        while self.next_pts < samples {
            let count = (samples - self.next_pts).min(SILENCE_CHUNK) as usize;
            let mut silence = Audio::new(
                self.encoder.format(),
                count,
                self.encoder.channel_layout(),
            );
            silence.set_rate(self.encoder.rate());
            for plane in 0..silence.planes() {
                silence.data_mut(plane).fill(0);
            }
            self.push(&mut silence, output)?;
        }
        Ok(())
    }

    fn finish(&mut self, output: &mut Output) -> Result<()> {
        self.chunker
            .get("in")
            .ok_or_else(|| missing_filter("in"))?
            .source()
            .flush()?;
        self.receive_and_process_filtered_frames(output)?;
        self.encoder.send_eof()?;
        self.receive_and_process_encoded_packets(output)
    }

    fn receive_and_process_filtered_frames(&mut self, output: &mut Output) -> Result<()> {
        let mut frame = Audio::empty();
        while self
            .chunker
            .get("out")
            .ok_or_else(|| missing_filter("out"))?
            .sink()
            .frame(&mut frame)
            .is_ok()
        {
            self.encoder.send_frame(&frame)?;
            self.receive_and_process_encoded_packets(output)?;
        }
        Ok(())
    }

    fn receive_and_process_encoded_packets(&mut self, output: &mut Output) -> Result<()> {
        let output_time_base = stream_time_base(output, self.stream_index)?;
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, output_time_base);
            packet.write_interleaved(output)?;
        }
        Ok(())
    }
}

/// Decodes one input audio stream and converts it for an [`AudioEncoder`].
struct AudioResampler {
    stream_index: usize,
    decoder: decoder::Audio,
    filter_graph: filter::Graph,
    next_pts: i64,
}

impl AudioResampler {
    fn new(input_stream: &format::stream::Stream, target: &AudioEncoder) -> Result<Self> {
        let decoder = codec::context::Context::from_parameters(input_stream.parameters())?
            .decoder()
            .audio()?;
        let channel_layout = if decoder.channel_layout().is_empty() {
            channel_layout::ChannelLayout::default(i32::from(decoder.channels()))
        } else {
            decoder.channel_layout()
        };
        let source_args = format!(
            "time_base=1/{rate}:sample_rate={rate}:sample_fmt={}:channel_layout=0x{:x}",
            decoder.format().name(),
            channel_layout.bits(),
            rate = decoder.rate(),
        );
        let filter_graph = audio_graph(&source_args, &target.encoder, false)?;

        Ok(Self {
            stream_index: input_stream.index(),
            decoder,
            filter_graph,
            next_pts: 0,
        })
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        self.decoder.send_packet(packet).map_err(Error::from)
    }

    fn receive_and_process_decoded_frames(
        &mut self,
        target: &mut AudioEncoder,
        output: &mut Output,
    ) -> Result<()> {
        let mut decoded = Audio::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            decoded.set_pts(Some(self.next_pts));
            self.next_pts += decoded.samples() as i64;
            self.filter_graph
                .get("in")
                .ok_or_else(|| missing_filter("in"))?
                .source()
                .add(&decoded)?;
            self.receive_and_process_filtered_frames(target, output)?;
        }
        Ok(())
    }

    fn receive_and_process_filtered_frames(
        &mut self,
        target: &mut AudioEncoder,
        output: &mut Output,
    ) -> Result<()> {
        loop {
            let mut frame = Audio::empty();
            let received = self
                .filter_graph
                .get("out")
                .ok_or_else(|| missing_filter("out"))?
                .sink()
                .frame(&mut frame);
            if received.is_err() {
                return Ok(());
            }
            target.push(&mut frame, output)?;
        }
    }

    fn finish(&mut self, target: &mut AudioEncoder, output: &mut Output) -> Result<()> {
        self.decoder.send_eof()?;
        self.receive_and_process_decoded_frames(target, output)?;
        self.filter_graph
            .get("in")
            .ok_or_else(|| missing_filter("in"))?
            .source()
            .flush()?;
        self.receive_and_process_filtered_frames(target, output)
    }
}

/// Decodes one input video stream and fits its frames onto the output canvas.
struct VideoScaler {
    stream_index: usize,
    decoder: decoder::Video,
    filter_graph: filter::Graph,
}

impl VideoScaler {
    fn new(
        input_stream: &format::stream::Stream,
        (width, height): (u32, u32),
        fps: i32,
    ) -> Result<Self> {
        let decoder = codec::context::Context::from_parameters(input_stream.parameters())?
            .decoder()
            .video()?;
        let aspect_ratio = match decoder.aspect_ratio() {
            ratio if ratio.numerator() > 0 => ratio,
            _ => Rational(1, 1),
        };
        let args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}:pixel_aspect={}",
            decoder.width(),
            decoder.height(),
            pixel_format_id(decoder.format()),
            input_stream.time_base(),
            aspect_ratio,
        );
        let spec = format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps}"
        );
        let filter_graph = video_graph(&args, &spec)?;

        Ok(Self {
            stream_index: input_stream.index(),
            decoder,
            filter_graph,
        })
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        self.decoder.send_packet(packet).map_err(Error::from)
    }

    fn receive_and_process_decoded_frames(
        &mut self,
        target: &mut VideoEncoder,
        output: &mut Output,
    ) -> Result<()> {
        let mut decoded = Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let timestamp = decoded.timestamp();
            decoded.set_pts(timestamp);
            self.filter_graph
                .get("in")
                .ok_or_else(|| missing_filter("in"))?
                .source()
                .add(&decoded)?;
            self.receive_and_process_filtered_frames(target, output)?;
        }
        Ok(())
    }

    fn receive_and_process_filtered_frames(
        &mut self,
        target: &mut VideoEncoder,
        output: &mut Output,
    ) -> Result<()> {
        loop {
            let mut frame = Video::empty();
            let received = self
                .filter_graph
                .get("out")
                .ok_or_else(|| missing_filter("out"))?
                .sink()
                .frame(&mut frame);
            if received.is_err() {
                return Ok(());
            }
            target.push(frame, output)?;
        }
    }

    fn finish(&mut self, target: &mut VideoEncoder, output: &mut Output) -> Result<()> {
        self.decoder.send_eof()?;
        self.receive_and_process_decoded_frames(target, output)?;
        self.filter_graph
            .get("in")
            .ok_or_else(|| missing_filter("in"))?
            .source()
            .flush()?;
        self.receive_and_process_filtered_frames(target, output)
    }
}

/// Runs the still through `drawtext` once; the result is reused for every frame.
fn caption_still(still: &RgbImage, caption: &str, settings: &RenderSettings) -> Result<Video> {
    let args = format!(
        "video_size={}x{}:pix_fmt={}:time_base=1/{}:pixel_aspect=1/1",
        still.width(),
        still.height(),
        pixel_format_id(format::Pixel::RGB24),
        settings.fps,
    );
    let width = (still.width() & !1).max(2);
    let height = (still.height() & !1).max(2);
    let spec = format!("scale={width}:{height},{}", drawtext(settings, caption));
    let mut filter_graph = video_graph(&args, &spec)?;

    let mut frame = rgb_frame(still);
    frame.set_pts(Some(0));
    filter_graph
        .get("in")
        .ok_or_else(|| missing_filter("in"))?
        .source()
        .add(&frame)?;
    filter_graph
        .get("in")
        .ok_or_else(|| missing_filter("in"))?
        .source()
        .flush()?;

    let mut captioned = Video::empty();
    filter_graph
        .get("out")
        .ok_or_else(|| missing_filter("out"))?
        .sink()
        .frame(&mut captioned)?;
    Ok(captioned)
}

/// Duration in seconds, from the container or else from the stream.
fn media_duration(input: &Input, stream_index: usize) -> Result<f64> {
    if input.duration() > 0 {
        return Ok(input.duration() as f64 * f64::from(rescale::TIME_BASE));
    }
    let stream = input
        .stream(stream_index)
        .ok_or(ffmpeg::Error::StreamNotFound)?;
    if stream.duration() > 0 {
        return Ok(stream.duration() as f64 * f64::from(stream.time_base()));
    }
    Err(Error::encoding("unknown audio duration"))
}

fn frame_size(path: &Path) -> Result<(u32, u32)> {
    let input = format::input(&path)?;
    let stream = input
        .streams()
        .best(media::Type::Video)
        .ok_or(ffmpeg::Error::StreamNotFound)?;
    let decoder = codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;
    Ok((decoder.width(), decoder.height()))
}

fn assemble(
    settings: &RenderSettings,
    sources: &ClipSources<'_>,
    output_path: &Path,
) -> Result<()> {
    let still = image::open(sources.image)?.into_rgb8();
    let mut captioned = caption_still(&still, sources.caption, settings)?;

    let mut input = format::input(&sources.audio)?;
    let mut output = format::output(&output_path)?;
    let mut video = VideoEncoder::new(
        &mut output,
        settings,
        captioned.width(),
        captioned.height(),
    )?;
    let mut audio = AudioEncoder::new(&mut output, settings)?;
    let mut voiceover = {
        let stream = input
            .streams()
            .best(media::Type::Audio)
            .ok_or_else(|| {
                Error::encoding(format!("no audio stream in '{}'", sources.audio.display()))
            })?;
        AudioResampler::new(&stream, &audio)?
    };
    let duration = media_duration(&input, voiceover.stream_index)?;
    output.write_header()?;

    let frame_count = clip_frame_count(duration, settings.fps);
    debug!(duration, frame_count, "encoding still");
    for _ in 0..frame_count {
        video.send(&mut captioned, &mut output)?;
    }
    video.finish(&mut output)?;

    for (stream, packet) in input.packets() {
        if stream.index() == voiceover.stream_index {
            voiceover.send_packet(&packet)?;
            voiceover.receive_and_process_decoded_frames(&mut audio, &mut output)?;
        }
    }
    voiceover.finish(&mut audio, &mut output)?;
    audio.pad_until(
        samples_for_frames(video.next_pts, settings.fps, settings.sample_rate),
        &mut output,
    )?;
    audio.finish(&mut output)?;

    output.write_trailer()?;
    Ok(())
}

fn concatenate(settings: &RenderSettings, clips: &[PathBuf], output_path: &Path) -> Result<()> {
    if clips.is_empty() {
        return Err(Error::encoding("no clips to concatenate"));
    }
    let sizes = clips
        .iter()
        .map(|clip| frame_size(clip))
        .collect::<Result<Vec<_>>>()?;
    let canvas = canvas(&sizes);
    debug!(width = canvas.0, height = canvas.1, "concatenation canvas");

    let mut output = format::output(&output_path)?;
    let mut video = VideoEncoder::new(&mut output, settings, canvas.0, canvas.1)?;
    let mut audio = AudioEncoder::new(&mut output, settings)?;
    output.write_header()?;

    let (fps, rate) = (settings.fps, settings.sample_rate);
    for clip in clips {
        debug!(clip = %clip.display(), "appending clip");
        append_clip(clip, canvas, settings.fps, &mut video, &mut audio, &mut output)?;
        // Start the next clip with both streams at the same time.
        video.hold_until(frames_for_samples(audio.next_pts, fps, rate), &mut output)?;
        audio.pad_until(samples_for_frames(video.next_pts, fps, rate), &mut output)?;
    }

    video.finish(&mut output)?;
    audio.finish(&mut output)?;
    output.write_trailer()?;
    Ok(())
}

fn append_clip(
    clip: &Path,
    canvas: (u32, u32),
    fps: i32,
    video: &mut VideoEncoder,
    audio: &mut AudioEncoder,
    output: &mut Output,
) -> Result<()> {
    let mut input = format::input(&clip)?;
    let mut scaler = {
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| Error::encoding(format!("no video stream in '{}'", clip.display())))?;
        VideoScaler::new(&stream, canvas, fps)?
    };
    let mut resampler = match input.streams().best(media::Type::Audio) {
        Some(stream) => Some(AudioResampler::new(&stream, audio)?),
        None => None,
    };

    for (stream, packet) in input.packets() {
        if stream.index() == scaler.stream_index {
            scaler.send_packet(&packet)?;
            scaler.receive_and_process_decoded_frames(video, output)?;
        } else if let Some(resampler) = resampler
            .as_mut()
            .filter(|resampler| resampler.stream_index == stream.index())
        {
            resampler.send_packet(&packet)?;
            resampler.receive_and_process_decoded_frames(audio, output)?;
        }
    }

    scaler.finish(video, output)?;
    if let Some(resampler) = resampler.as_mut() {
        resampler.finish(audio, output)?;
    }
    Ok(())
}
