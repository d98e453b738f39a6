use std::fmt;
use std::str::FromStr;

use crate::foundation::error::OperationError;
use crate::media::item::MediaKind;

/// Container an export job writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// QuickTime movie.
    Mov,
    /// MPEG-4 movie.
    Mp4,
    /// AAC audio in an MPEG-4 container.
    M4a,
    /// PCM WAVE audio.
    Wav,
    /// Lossless still.
    Png,
    /// Lossy still.
    Jpeg,
}

impl OutputFormat {
    /// Default container for results of the given kind.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Self::Mov,
            MediaKind::Audio => Self::M4a,
            MediaKind::Image => Self::Png,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Mp4 => "mp4",
            Self::M4a => "m4a",
            Self::Wav => "wav",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Kind of the item an export in this format produces.
    pub fn media_kind(self) -> MediaKind {
        match self {
            Self::Mov | Self::Mp4 => MediaKind::Video,
            Self::M4a | Self::Wav => MediaKind::Audio,
            Self::Png | Self::Jpeg => MediaKind::Image,
        }
    }

    pub fn is_still(self) -> bool {
        self.media_kind() == MediaKind::Image
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mov" => Ok(Self::Mov),
            "mp4" => Ok(Self::Mp4),
            "m4a" => Ok(Self::M4a),
            "wav" => Ok(Self::Wav),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(OperationError::invalid_parameters(format!(
                "unknown output format '{other}'"
            ))),
        }
    }
}
