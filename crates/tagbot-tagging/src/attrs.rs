//! Attributes derived from media metadata.

use std::path::Path;

use tagbot_types::{GeneratedAttrs, MediaFile};

use crate::packs::StickerPack;

/// MIME type of animated (Lottie) stickers.
const ANIMATED_STICKER_MIME: &str = "application/x-tgsticker";

/// Conventional extensions for common MIME types. `mime_guess` lists
/// several extensions for some of these and its first one is not always
/// the usual one.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("audio/mpeg", "mp3"),
    ("audio/ogg", "ogg"),
    ("text/plain", "txt"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
];

/// File extension without the dot, preferring the file name over the MIME type.
pub fn extension_for(file: &MediaFile) -> Option<String> {
    let from_name = file
        .name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());

    if let Some(ext) = from_name {
        return Some(ext.to_lowercase());
    }

    let mime = file.mime_type.as_deref()?.to_ascii_lowercase();
    if mime == ANIMATED_STICKER_MIME {
        return Some("tgs".to_string());
    }
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(known, _)| *known == mime) {
        return Some(ext.to_string());
    }
    mime_guess::get_mime_extensions_str(&mime)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
}

/// Derive the generated attributes for a media item.
///
/// The file name is only kept for media outside a sticker pack; pack
/// stickers are named by their pack instead.
pub fn generated_attrs(file: &MediaFile, pack: Option<&StickerPack>) -> GeneratedAttrs {
    let mut attrs = GeneratedAttrs {
        ext: extension_for(file),
        is_animated: file.mime_type.as_deref() == Some(ANIMATED_STICKER_MIME),
        ..GeneratedAttrs::default()
    };

    match pack {
        Some(pack) => {
            attrs.pack_name = Some(pack.title.clone());
            attrs.pack_link = Some(pack.short_name.clone());
            attrs.emoji = Some(pack.emoji_for(file.id));
        }
        None => attrs.filename = file.name.clone(),
    }

    attrs.title = match (&file.performer, &file.title) {
        (Some(performer), Some(title)) => Some(format!("{} - {}", performer, title)),
        (None, Some(title)) => Some(title.clone()),
        _ => None,
    };

    attrs
}
