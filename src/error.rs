use std::fmt;
use std::path::PathBuf;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Hosted service a request was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Service {
    Completion,
    Image,
    ImageDownload,
    Speech,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Completion => "completion",
            Service::Image => "image generation",
            Service::ImageDownload => "image download",
            Service::Speech => "speech",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("prompt cannot be empty")]
    EmptyInput,

    #[error(
        "the input file '{}' was not found, run the text stage first",
        path.display()
    )]
    MissingArtifact { path: PathBuf },

    #[error("nothing to render in '{}'", path.display())]
    NothingToRender { path: PathBuf },

    #[error("{service} request failed: {source}")]
    Upstream {
        service: Service,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn upstream<E>(service: Service, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Upstream {
            service,
            source: source.into(),
        }
    }

    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        Error::Encoding(reason.into())
    }
}

impl From<ffmpeg_next::Error> for Error {
    fn from(err: ffmpeg_next::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encoding(err.to_string())
    }
}
