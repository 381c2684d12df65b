//! Media kinds and the media descriptor handed over by the messaging front-end.
//!
//! The front-end owns the platform objects; the core only ever sees a
//! [`MediaFile`] whose identifiers are treated as opaque and immutable.

use serde::{Deserialize, Serialize};

/// The closed set of media kinds a document can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Gif,
    Sticker,
    File,
    Audio,
    Voice,
}

impl MediaKind {
    /// Every kind, in display order.
    pub const ALL: [MediaKind; 7] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Gif,
        MediaKind::Sticker,
        MediaKind::File,
        MediaKind::Audio,
        MediaKind::Voice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
            MediaKind::Sticker => "sticker",
            MediaKind::File => "file",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
        }
    }

    /// Parse from string, returning None for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "gif" => Some(MediaKind::Gif),
            "sticker" => Some(MediaKind::Sticker),
            "file" => Some(MediaKind::File),
            "audio" => Some(MediaKind::Audio),
            "voice" => Some(MediaKind::Voice),
            _ => None,
        }
    }

    /// The kind search results of this kind are presented as.
    ///
    /// Inline audio results only work for `audio/mpeg`, so audio is shown
    /// as a plain file. Queries still filter on the stored kind.
    pub fn search_kind(&self) -> MediaKind {
        match self {
            MediaKind::Audio => MediaKind::File,
            other => *other,
        }
    }

    /// Whether results of this kind are shown as a gallery grid.
    pub fn is_gallery(&self) -> bool {
        match self {
            MediaKind::Gif | MediaKind::Sticker | MediaKind::Photo | MediaKind::Video => true,
            MediaKind::File | MediaKind::Audio | MediaKind::Voice => false,
        }
    }

    /// Classify a media shape.
    ///
    /// Returns None for media the system cannot store (contacts, polls,
    /// web previews and the like).
    pub fn from_shape(shape: &MediaShape) -> Option<Self> {
        match shape {
            MediaShape::Photo => Some(MediaKind::Photo),
            MediaShape::Document { attributes } => Some(classify_document(attributes)),
            MediaShape::Unsupported => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown media kind: {}", s))
    }
}

fn classify_document(attributes: &[DocumentAttribute]) -> MediaKind {
    let has = |wanted: fn(&DocumentAttribute) -> bool| attributes.iter().any(wanted);

    if has(|a| matches!(a, DocumentAttribute::Sticker)) {
        MediaKind::Sticker
    } else if has(|a| matches!(a, DocumentAttribute::Animated)) {
        MediaKind::Gif
    } else if has(|a| matches!(a, DocumentAttribute::Video { .. })) {
        MediaKind::Video
    } else if has(|a| matches!(a, DocumentAttribute::Audio { voice: true })) {
        MediaKind::Voice
    } else if has(|a| matches!(a, DocumentAttribute::Audio { voice: false })) {
        MediaKind::Audio
    } else {
        MediaKind::File
    }
}

/// Attributes a platform document may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAttribute {
    Sticker,
    Animated,
    Video { round: bool },
    Audio { voice: bool },
}

/// Shape of a replied-to media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaShape {
    Photo,
    Document { attributes: Vec<DocumentAttribute> },
    Unsupported,
}

/// Opaque reference to a sticker pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StickerSetRef {
    pub id: i64,
    pub access_hash: i64,
}

/// Media metadata supplied by the messaging front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    /// Platform media id
    pub id: i64,

    /// Platform access hash, stored verbatim for later retrieval
    pub access_hash: i64,

    pub shape: MediaShape,

    #[serde(default)]
    pub mime_type: Option<String>,

    /// Original file name, if the platform kept one
    #[serde(default)]
    pub name: Option<String>,

    /// Audio track title
    #[serde(default)]
    pub title: Option<String>,

    /// Audio track performer
    #[serde(default)]
    pub performer: Option<String>,

    /// Pack the sticker belongs to
    #[serde(default)]
    pub sticker_set: Option<StickerSetRef>,
}

impl MediaFile {
    /// Create a media descriptor with no optional metadata.
    pub fn new(id: i64, access_hash: i64, shape: MediaShape) -> Self {
        Self {
            id,
            access_hash,
            shape,
            mime_type: None,
            name: None,
            title: None,
            performer: None,
            sticker_set: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_performer(mut self, performer: impl Into<String>) -> Self {
        self.performer = Some(performer.into());
        self
    }

    pub fn with_sticker_set(mut self, sticker_set: StickerSetRef) -> Self {
        self.sticker_set = Some(sticker_set);
        self
    }

    /// The kind this media would be stored as, if supported.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_shape(&self.shape)
    }
}
