//! Imported media and text assets.

use serde::{Deserialize, Serialize};
use splice_core::{clamp_percent, Color, FadeEnvelope, RationalTime};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique asset identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Raw payload of a media asset.
///
/// Bytes are shared immutably between project snapshots and freed when the
/// last snapshot referencing the asset goes away.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Stored in project files as a base64 string.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::serialization::payload"
    )]
    pub bytes: Option<Arc<[u8]>>,
}

impl MediaData {
    pub fn new(mime: Option<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime,
            bytes: Some(bytes.into()),
        }
    }

    /// Payload-less media, as restored from a document saved without bytes.
    pub fn empty(mime: Option<String>) -> Self {
        Self { mime, bytes: None }
    }

    pub fn has_bytes(&self) -> bool {
        self.bytes.is_some()
    }

    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalized position of a text overlay, in percent of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextPosition {
    pub x: f64,
    pub y: f64,
}

impl TextPosition {
    /// Both coordinates are clamped into [0, 100].
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_percent(x),
            y: clamp_percent(y),
        }
    }

    pub const TOP: Self = Self { x: 50.0, y: 15.0 };
    pub const CENTER: Self = Self { x: 50.0, y: 50.0 };
    pub const BOTTOM: Self = Self { x: 50.0, y: 85.0 };
}

impl Default for TextPosition {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Everything needed to render a text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDescriptor {
    pub text: String,
    /// Font size in pixels.
    pub font_size: u32,
    pub font_family: String,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    pub position: TextPosition,
    /// Fade-in seconds, used when the clip carries no fades of its own.
    pub fade_in: f64,
    pub fade_out: f64,
}

impl TextDescriptor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: 48,
            font_family: "Arial, sans-serif".to_string(),
            color: Color::WHITE,
            background: None,
            position: TextPosition::CENTER,
            fade_in: 0.5,
            fade_out: 0.5,
        }
    }

    pub fn with_position(mut self, position: TextPosition) -> Self {
        self.position = TextPosition::new(position.x, position.y);
        self
    }

    pub fn with_font_size(mut self, px: u32) -> Self {
        self.font_size = px.max(1);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_background(mut self, background: Option<Color>) -> Self {
        self.background = background;
        self
    }

    pub fn with_fades(mut self, fade_in: f64, fade_out: f64) -> Self {
        let env = FadeEnvelope::new(fade_in, fade_out);
        self.fade_in = env.fade_in;
        self.fade_out = env.fade_out;
        self
    }

    pub fn envelope(&self) -> FadeEnvelope {
        FadeEnvelope::new(self.fade_in, self.fade_out)
    }

    /// Display name: the text cut at 20 characters.
    pub fn display_name(&self) -> String {
        let mut name: String = self.text.chars().take(20).collect();
        if self.text.chars().count() > 20 {
            name.push_str("...");
        }
        name
    }
}

/// The closed set of asset kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetKind {
    Video {
        media: MediaData,
        duration: RationalTime,
        width: u32,
        height: u32,
    },
    Audio {
        media: MediaData,
        duration: RationalTime,
    },
    Image {
        media: MediaData,
        width: u32,
        height: u32,
    },
    Text(TextDescriptor),
}

/// Discriminant of [`AssetKind`], handy for compatibility checks and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Video,
    Audio,
    Image,
    Text,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Text => "text",
        };
        f.write_str(s)
    }
}

/// An imported asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub kind: AssetKind,
}

impl Asset {
    pub fn new(name: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            id: AssetId::new(),
            name: name.into(),
            kind,
        }
    }

    pub fn video(name: impl Into<String>, media: MediaData, duration: RationalTime, width: u32, height: u32) -> Self {
        Self::new(
            name,
            AssetKind::Video {
                media,
                duration,
                width,
                height,
            },
        )
    }

    pub fn audio(name: impl Into<String>, media: MediaData, duration: RationalTime) -> Self {
        Self::new(name, AssetKind::Audio { media, duration })
    }

    pub fn image(name: impl Into<String>, media: MediaData, width: u32, height: u32) -> Self {
        Self::new(name, AssetKind::Image { media, width, height })
    }

    pub fn text(descriptor: TextDescriptor) -> Self {
        Self::new(descriptor.display_name(), AssetKind::Text(descriptor))
    }

    pub fn asset_type(&self) -> AssetType {
        match self.kind {
            AssetKind::Video { .. } => AssetType::Video,
            AssetKind::Audio { .. } => AssetType::Audio,
            AssetKind::Image { .. } => AssetType::Image,
            AssetKind::Text(_) => AssetType::Text,
        }
    }

    /// Intrinsic duration. Images and text have none.
    pub fn duration(&self) -> Option<RationalTime> {
        match &self.kind {
            AssetKind::Video { duration, .. } | AssetKind::Audio { duration, .. } => Some(*duration),
            AssetKind::Image { .. } | AssetKind::Text(_) => None,
        }
    }

    /// Raw payload, if this asset kind carries one.
    pub fn media(&self) -> Option<&MediaData> {
        match &self.kind {
            AssetKind::Video { media, .. }
            | AssetKind::Audio { media, .. }
            | AssetKind::Image { media, .. } => Some(media),
            AssetKind::Text(_) => None,
        }
    }

    pub fn text_descriptor(&self) -> Option<&TextDescriptor> {
        match &self.kind {
            AssetKind::Text(desc) => Some(desc),
            _ => None,
        }
    }

    /// Native dimensions for visual assets.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.kind {
            AssetKind::Video { width, height, .. } | AssetKind::Image { width, height, .. } => {
                Some((width, height))
            }
            _ => None,
        }
    }

    /// Copy of this asset without its payload bytes.
    pub fn without_bytes(&self) -> Self {
        let mut asset = self.clone();
        match &mut asset.kind {
            AssetKind::Video { media, .. }
            | AssetKind::Audio { media, .. }
            | AssetKind::Image { media, .. } => media.bytes = None,
            AssetKind::Text(_) => {}
        }
        asset
    }
}
