use std::fmt;

use crate::media::item::{MediaItem, MediaKind};
use crate::registry::params::{ParamSpec, ParamType};

const VIDEO: &[MediaKind] = &[MediaKind::Video];
const AUDIO: &[MediaKind] = &[MediaKind::Audio];
const VIDEO_AUDIO: &[MediaKind] = &[MediaKind::Video, MediaKind::Audio];
const VIDEO_IMAGE: &[MediaKind] = &[MediaKind::Video, MediaKind::Image];

const NONE: &[ParamSpec] = &[];
const WINDOW: &[ParamSpec] = &[
    ParamSpec::required("start", ParamType::Number),
    ParamSpec::required("duration", ParamType::Number),
];
const ASSETS: &[ParamSpec] = &[ParamSpec::required("assets", ParamType::Assets)];
const SIZE: &[ParamSpec] = &[
    ParamSpec::required("width", ParamType::Number),
    ParamSpec::required("height", ParamType::Number),
];
const CROP: &[ParamSpec] = &[
    ParamSpec::required("x", ParamType::Number),
    ParamSpec::required("y", ParamType::Number),
    ParamSpec::required("w", ParamType::Number),
    ParamSpec::required("h", ParamType::Number),
];
const ROTATE: &[ParamSpec] = &[ParamSpec::required("angle", ParamType::Number)];
const FLIP: &[ParamSpec] = &[
    ParamSpec::optional("horizontal", ParamType::Bool),
    ParamSpec::optional("vertical", ParamType::Bool),
];
const MIRROR: &[ParamSpec] = &[ParamSpec::optional("vertical", ParamType::Bool)];
const SPEED: &[ParamSpec] = &[ParamSpec::required("factor", ParamType::Number)];
const CHANGE_FPS: &[ParamSpec] = &[ParamSpec::required("fps", ParamType::Number)];
const FADES: &[ParamSpec] = &[
    ParamSpec::required("fadeIn", ParamType::Number),
    ParamSpec::required("fadeOut", ParamType::Number),
];
const FADE_IN: &[ParamSpec] = &[ParamSpec::required("fadeIn", ParamType::Number)];
const FADE_OUT: &[ParamSpec] = &[ParamSpec::required("fadeOut", ParamType::Number)];
const VOLUME: &[ParamSpec] = &[ParamSpec::required("volume", ParamType::Number)];
const ADD_AUDIO: &[ParamSpec] = &[ParamSpec::required("audio", ParamType::Asset)];
const EXPORT_FORMAT: &[ParamSpec] = &[ParamSpec::required("format", ParamType::Text)];
const FRAME_EXPORT: &[ParamSpec] = &[
    ParamSpec::required("time", ParamType::Number),
    ParamSpec::optional("format", ParamType::Text),
];
const METADATA: &[ParamSpec] = &[ParamSpec::required("metadata", ParamType::Map)];

/// Every operation the engine knows.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Trim,
    AudioTrim,
    Concat,
    MergeAudio,
    Crop,
    Rotate,
    Flip,
    Mirror,
    Upscale,
    Resize,
    ChangeCanvas,
    Speed,
    ChangeFps,
    FadeAudio,
    AudioFadeIn,
    AudioFadeOut,
    Volume,
    AddAudio,
    RemoveAudio,
    ExtractAudio,
    ExportFormat,
    AudioToWav,
    FrameExport,
    DuplicateVideo,
    DuplicateAudio,
    SaveMetadata,
    RemoveMetadata,
}

impl Operation {
    pub const ALL: [Operation; 27] = [
        Self::Trim,
        Self::AudioTrim,
        Self::Concat,
        Self::MergeAudio,
        Self::Crop,
        Self::Rotate,
        Self::Flip,
        Self::Mirror,
        Self::Upscale,
        Self::Resize,
        Self::ChangeCanvas,
        Self::Speed,
        Self::ChangeFps,
        Self::FadeAudio,
        Self::AudioFadeIn,
        Self::AudioFadeOut,
        Self::Volume,
        Self::AddAudio,
        Self::RemoveAudio,
        Self::ExtractAudio,
        Self::ExportFormat,
        Self::AudioToWav,
        Self::FrameExport,
        Self::DuplicateVideo,
        Self::DuplicateAudio,
        Self::SaveMetadata,
        Self::RemoveMetadata,
    ];

    /// Stable identifier used for dispatch.
    pub fn id(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::AudioTrim => "audio_trim",
            Self::Concat => "concat",
            Self::MergeAudio => "merge_audio",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Flip => "flip",
            Self::Mirror => "mirror",
            Self::Upscale => "upscale",
            Self::Resize => "resize",
            Self::ChangeCanvas => "change_canvas",
            Self::Speed => "speed",
            Self::ChangeFps => "change_fps",
            Self::FadeAudio => "fade_audio",
            Self::AudioFadeIn => "audio_fade_in",
            Self::AudioFadeOut => "audio_fade_out",
            Self::Volume => "volume",
            Self::AddAudio => "add_audio",
            Self::RemoveAudio => "remove_audio",
            Self::ExtractAudio => "extract_audio",
            Self::ExportFormat => "export_format",
            Self::AudioToWav => "audio_to_wav",
            Self::FrameExport => "frame_export",
            Self::DuplicateVideo => "duplicate_video",
            Self::DuplicateAudio => "duplicate_audio",
            Self::SaveMetadata => "save_metadata",
            Self::RemoveMetadata => "remove_metadata",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Trim => "Trim video",
            Self::AudioTrim => "Trim audio",
            Self::Concat => "Join videos",
            Self::MergeAudio => "Merge audio files",
            Self::Crop => "Crop video",
            Self::Rotate => "Rotate video",
            Self::Flip => "Flip video",
            Self::Mirror => "Mirror",
            Self::Upscale => "Upscale video",
            Self::Resize => "Resize",
            Self::ChangeCanvas => "Change canvas",
            Self::Speed => "Change speed",
            Self::ChangeFps => "Change FPS",
            Self::FadeAudio => "Audio fade in/out",
            Self::AudioFadeIn => "Audio fade in",
            Self::AudioFadeOut => "Audio fade out",
            Self::Volume => "Change volume",
            Self::AddAudio => "Add audio to video",
            Self::RemoveAudio => "Remove audio track",
            Self::ExtractAudio => "Extract audio",
            Self::ExportFormat => "Export to format",
            Self::AudioToWav => "Audio to WAV",
            Self::FrameExport => "Export frame",
            Self::DuplicateVideo => "Duplicate video",
            Self::DuplicateAudio => "Duplicate audio",
            Self::SaveMetadata => "Save metadata",
            Self::RemoveMetadata => "Remove metadata",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Trim => "Keep `duration` seconds starting at `start`.",
            Self::AudioTrim => "Keep `duration` seconds of audio starting at `start`.",
            Self::Concat => "Append `assets` after this video, track kind by track kind.",
            Self::MergeAudio => "Append the audio of `assets` after this one.",
            Self::Crop => "Keep the `w` x `h` rectangle at (`x`, `y`).",
            Self::Rotate => "Rotate by `angle` radians about the top-left corner.",
            Self::Flip => "Flip along the `horizontal` and/or `vertical` axis.",
            Self::Mirror => "Mirror left-right, or top-bottom when `vertical` is set.",
            Self::Upscale => "Scale the frame to `width` x `height`.",
            Self::Resize => "Scale the frame to `width` x `height`.",
            Self::ChangeCanvas => "Center the frame on a `width` x `height` canvas.",
            Self::Speed => "Play `factor` times faster; keeps only the primary track.",
            Self::ChangeFps => "Re-time the output at `fps` frames per second.",
            Self::FadeAudio => {
                "Fade the audio in over `fadeIn` and out over `fadeOut` seconds; writes m4a audio."
            }
            Self::AudioFadeIn => "Fade the audio in over `fadeIn` seconds.",
            Self::AudioFadeOut => "Fade the audio out over `fadeOut` seconds.",
            Self::Volume => "Set a constant level `volume`, clamped to [0, 1]; writes m4a.",
            Self::AddAudio => "Lay the `audio` asset under the video, clipped to its length.",
            Self::RemoveAudio => "Drop the audio track.",
            Self::ExtractAudio => "Keep only the audio track, as m4a.",
            Self::ExportFormat => "Re-encode into `format` (mp4, mov, m4a or wav).",
            Self::AudioToWav => "Re-encode audio as PCM WAV.",
            Self::FrameExport => "Export the frame shown at `time` as a png or jpg still.",
            Self::DuplicateVideo => "Write an independent copy of the video.",
            Self::DuplicateAudio => "Write an independent copy of the audio.",
            Self::SaveMetadata => "Replace container metadata with `metadata`.",
            Self::RemoveMetadata => "Strip container metadata.",
        }
    }

    /// Asset kinds the operation accepts.
    pub fn kinds(self) -> &'static [MediaKind] {
        match self {
            Self::Trim
            | Self::Concat
            | Self::Crop
            | Self::Rotate
            | Self::Flip
            | Self::Upscale
            | Self::ChangeCanvas
            | Self::ChangeFps
            | Self::AddAudio
            | Self::RemoveAudio
            | Self::ExtractAudio
            | Self::FrameExport
            | Self::DuplicateVideo => VIDEO,
            Self::AudioTrim
            | Self::MergeAudio
            | Self::AudioFadeIn
            | Self::AudioFadeOut
            | Self::AudioToWav
            | Self::DuplicateAudio => AUDIO,
            Self::Mirror | Self::Resize => VIDEO_IMAGE,
            Self::Speed
            | Self::FadeAudio
            | Self::Volume
            | Self::ExportFormat
            | Self::SaveMetadata
            | Self::RemoveMetadata => VIDEO_AUDIO,
        }
    }

    pub fn applies_to(self, asset: &MediaItem) -> bool {
        self.kinds().contains(&asset.kind)
    }

    /// Parameter schema checked before the operation runs.
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::Trim | Self::AudioTrim => WINDOW,
            Self::Concat | Self::MergeAudio => ASSETS,
            Self::Crop => CROP,
            Self::Rotate => ROTATE,
            Self::Flip => FLIP,
            Self::Mirror => MIRROR,
            Self::Upscale | Self::Resize | Self::ChangeCanvas => SIZE,
            Self::Speed => SPEED,
            Self::ChangeFps => CHANGE_FPS,
            Self::FadeAudio => FADES,
            Self::AudioFadeIn => FADE_IN,
            Self::AudioFadeOut => FADE_OUT,
            Self::Volume => VOLUME,
            Self::AddAudio => ADD_AUDIO,
            Self::ExportFormat => EXPORT_FORMAT,
            Self::FrameExport => FRAME_EXPORT,
            Self::SaveMetadata => METADATA,
            Self::RemoveAudio
            | Self::ExtractAudio
            | Self::AudioToWav
            | Self::DuplicateVideo
            | Self::DuplicateAudio
            | Self::RemoveMetadata => NONE,
        }
    }

    pub fn descriptor(self) -> OperationDescriptor {
        OperationDescriptor {
            operation: self,
            id: self.id(),
            display_name: self.display_name(),
            description: self.description(),
            kinds: self.kinds(),
            params: self.params(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Registry entry describing one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct OperationDescriptor {
    #[serde(skip)]
    pub operation: Operation,
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub kinds: &'static [MediaKind],
    pub params: &'static [ParamSpec],
}

impl OperationDescriptor {
    pub fn applies_to(&self, asset: &MediaItem) -> bool {
        self.operation.applies_to(asset)
    }
}
