use crate::errors::{AppError, Result};
use crate::metadata::{AudioTagger, CoverArtData, TrackMetadata};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::path::{Path, PathBuf};

/// Tag writer backed by lofty (ID3v2 for MP3, ilst for M4A, ...).
#[derive(Debug, Default, Clone)]
pub struct LoftyTagger;

impl LoftyTagger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AudioTagger for LoftyTagger {
    async fn embed(&self, file_path: &Path, track: &TrackMetadata, cover: Option<&CoverArtData>) -> Result<()> {
        let path: PathBuf = file_path.to_path_buf();
        let track = track.clone();
        let cover = cover.cloned();

        tokio::task::spawn_blocking(move || write_tags(&path, &track, cover.as_ref())).await?
    }
}

/// Blocking tag write. Replaces any existing front cover.
pub fn write_tags(path: &Path, track: &TrackMetadata, cover: Option<&CoverArtData>) -> Result<()> {
    log::info!("🏷️ [TAG] Embedding metadata into: {:?}", path);

    let mut tagged_file = Probe::open(path)?.read()?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| AppError::Tagging(format!("{:?} tag could not be created", tag_type)))?;

    tag.set_title(track.title.clone());
    tag.set_artist(track.artist.clone());
    if !track.album.is_empty() {
        tag.set_album(track.album.clone());
    }
    if let Some(year) = track.year {
        tag.set_year(year);
    }
    if let Some(number) = track.track_number {
        tag.set_track(number);
    }
    if let Some(isrc) = &track.isrc {
        tag.insert_text(ItemKey::Isrc, isrc.clone());
    }

    if let Some(cover) = cover {
        let mime = match cover.mime_type.as_str() {
            "image/png" => MimeType::Png,
            _ => MimeType::Jpeg,
        };
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(mime),
            Some("Cover".to_string()),
            cover.data.clone(),
        ));
    }

    tag.save_to_path(path, WriteOptions::default())?;
    log::info!("✅ [TAG] Metadata embedded successfully");
    Ok(())
}
