// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Candidate screenshot collection for an analysis session

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::UploadConfig;
use crate::{AuditError, Result};

/// Raw file contents as handed over by the uploader
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its media type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AuditError::UnsupportedType(path.display().to_string()))?
            .to_string();
        Ok(Self::new(file_name, media_type_for_path(path), bytes))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a declared media type from the file extension
pub fn media_type_for_path(path: &Path) -> String {
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));
    if is_svg {
        // Not a raster format, so the image crate has no entry for it
        return "image/svg+xml".to_string();
    }
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

/// Local preview handle for an image (released on remove/clear)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    fn allocate() -> Self {
        Self(format!("preview:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An uploaded screenshot awaiting analysis
#[derive(Debug, Clone)]
pub struct CandidateImage {
    pub id: String,
    pub name: String,
    pub preview: PreviewHandle,
    pub remote_path: Option<String>,
    pub payload: Option<ImagePayload>,
}

impl CandidateImage {
    pub fn is_persisted(&self) -> bool {
        self.remote_path.is_some()
    }
}

/// Serializable part of an image, used by session snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub name: String,
    pub remote_path: Option<String>,
}

impl From<&CandidateImage> for ImageRecord {
    fn from(image: &CandidateImage) -> Self {
        Self {
            id: image.id.clone(),
            name: image.name.clone(),
            remote_path: image.remote_path.clone(),
        }
    }
}

/// Ordered set of candidate images with unique display names
pub struct ImageCollection {
    images: Vec<CandidateImage>,
    current: Option<String>,
    live_previews: HashSet<PreviewHandle>,
    limits: UploadConfig,
}

impl ImageCollection {
    pub fn new(limits: UploadConfig) -> Self {
        Self {
            images: Vec::new(),
            current: None,
            live_previews: HashSet::new(),
            limits,
        }
    }

    /// Validate and append an uploaded file
    pub fn add(&mut self, payload: ImagePayload) -> Result<CandidateImage> {
        self.add_at(payload, chrono::Utc::now().timestamp_millis())
    }

    fn add_at(&mut self, payload: ImagePayload, now_ms: i64) -> Result<CandidateImage> {
        let declared = &payload.media_type;
        if !self.limits.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(declared)) {
            return Err(AuditError::UnsupportedType(payload.media_type.clone()));
        }
        if payload.len() > self.limits.max_file_bytes {
            return Err(AuditError::FileTooLarge {
                name: payload.file_name.clone(),
                size: payload.len(),
                limit: self.limits.max_file_bytes,
            });
        }

        let name = self.unique_name(&payload.file_name, now_ms);
        let image = CandidateImage {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            preview: self.allocate_preview(),
            remote_path: None,
            payload: Some(payload),
        };

        info!("Added image {} ({})", image.name, image.id);
        self.images.push(image.clone());
        Ok(image)
    }

    /// Remove an image; unknown ids are ignored
    pub fn remove(&mut self, id: &str) {
        let Some(idx) = self.images.iter().position(|i| i.id == id) else {
            debug!("remove: no image with id {}", id);
            return;
        };
        let image = self.images.remove(idx);
        self.live_previews.remove(&image.preview);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        info!("Removed image {}", image.name);
    }

    /// Drop every image and release all preview handles
    pub fn clear(&mut self) {
        self.live_previews.clear();
        self.images.clear();
        self.current = None;
    }

    /// Record where the persist-image collaborator stored an image
    pub fn mark_persisted(&mut self, id: &str, remote_path: &str) {
        if let Some(image) = self.images.iter_mut().find(|i| i.id == id) {
            image.remote_path = Some(remote_path.to_string());
            debug!("Image {} persisted at {}", image.name, remote_path);
        }
    }

    pub fn list(&self) -> &[CandidateImage] {
        &self.images
    }

    pub fn get(&self, id: &str) -> Option<&CandidateImage> {
        self.images.iter().find(|i| i.id == id)
    }

    /// Images not yet stored remotely, in collection order
    pub fn pending(&self) -> Vec<CandidateImage> {
        self.images.iter().filter(|i| !i.is_persisted()).cloned().collect()
    }

    /// Select the image shown by the preview step. Returns false for unknown ids.
    pub fn set_current(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.current = None;
                true
            }
            Some(id) if self.get(id).is_some() => {
                self.current = Some(id.to_string());
                true
            }
            Some(_) => false,
        }
    }

    pub fn current(&self) -> Option<&CandidateImage> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of preview handles not yet released
    pub fn live_previews(&self) -> usize {
        self.live_previews.len()
    }

    pub fn records(&self) -> Vec<ImageRecord> {
        self.images.iter().map(ImageRecord::from).collect()
    }

    /// Rebuild entries from a snapshot. Restored images carry no payload.
    pub fn restore(&mut self, records: Vec<ImageRecord>) {
        self.clear();
        for record in records {
            // Snapshots written by this module are already unique; guard anyway
            if self.images.iter().any(|i| i.name == record.name) {
                debug!("Skipping duplicate restored image {}", record.name);
                continue;
            }
            let preview = self.allocate_preview();
            self.images.push(CandidateImage {
                id: record.id,
                name: record.name,
                preview,
                remote_path: record.remote_path,
                payload: None,
            });
        }
    }

    fn allocate_preview(&mut self) -> PreviewHandle {
        let handle = PreviewHandle::allocate();
        self.live_previews.insert(handle.clone());
        handle
    }

    fn unique_name(&self, requested: &str, now_ms: i64) -> String {
        if !self.name_taken(requested) {
            return requested.to_string();
        }
        let (base, ext) = split_extension(requested);
        let mut stamp = now_ms;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{}_{}.{}", base, stamp, ext),
                None => format!("{}_{}", base, stamp),
            };
            if !self.name_taken(&candidate) {
                return candidate;
            }
            stamp += 1;
        }
    }

    fn name_taken(&self, name: &str) -> bool {
        self.images.iter().any(|i| i.name == name)
    }
}

impl Default for ImageCollection {
    fn default() -> Self {
        Self::new(UploadConfig::default())
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, Some(ext)),
        _ => (name, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImagePayload {
        ImagePayload::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_add_accepts_supported_types() {
        let mut images = ImageCollection::default();
        for (name, ty) in [
            ("a.jpg", "image/jpeg"),
            ("b.png", "image/png"),
            ("c.svg", "image/svg+xml"),
            ("d.gif", "image/gif"),
        ] {
            images.add(ImagePayload::new(name, ty, vec![1])).unwrap();
        }
        assert_eq!(images.len(), 4);
        assert!(images.list().iter().all(|i| i.remote_path.is_none()));
    }

    #[test]
    fn test_media_type_match_ignores_case() {
        let mut images = ImageCollection::default();
        let image = images.add(ImagePayload::new("a.png", "Image/PNG", vec![1])).unwrap();
        assert_eq!(image.payload.unwrap().media_type, "Image/PNG");
        assert!(images.add(ImagePayload::new("b.bmp", "IMAGE/BMP", vec![1])).is_err());
    }

    #[test]
    fn test_unsupported_type_leaves_collection_untouched() {
        let mut images = ImageCollection::default();
        images.add(png("keep.png")).unwrap();

        for ty in ["image/webp", "application/pdf", "text/plain", ""] {
            let err = images.add(ImagePayload::new("x.webp", ty, vec![1])).unwrap_err();
            assert!(matches!(err, AuditError::UnsupportedType(_)));
        }
        assert_eq!(images.len(), 1);
        assert_eq!(images.live_previews(), 1);
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut images = ImageCollection::new(UploadConfig {
            max_file_bytes: 3,
            ..UploadConfig::default()
        });
        let err = images.add(png("big.png")).unwrap_err();
        assert!(matches!(err, AuditError::FileTooLarge { size: 4, limit: 3, .. }));
        assert!(images.is_empty());
    }

    #[test]
    fn test_duplicate_name_gets_timestamp() {
        let mut images = ImageCollection::default();
        images.add_at(png("login.png"), 1_700_000_000_000).unwrap();
        let second = images.add_at(png("login.png"), 1_700_000_000_123).unwrap();
        assert_eq!(second.name, "login_1700000000123.png");
    }

    #[test]
    fn test_same_millisecond_duplicates_stay_unique() {
        let mut images = ImageCollection::default();
        for _ in 0..3 {
            images.add_at(png("home.screen.png"), 42).unwrap();
        }
        let names: Vec<_> = images.list().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["home.screen.png", "home.screen_42.png", "home.screen_43.png"]);
    }

    #[test]
    fn test_names_unique_across_add_remove_sequences() {
        let mut images = ImageCollection::default();
        let mut ids = Vec::new();
        for round in 0..20 {
            let img = images.add(png(if round % 3 == 0 { "a.png" } else { "b.png" })).unwrap();
            ids.push(img.id);
            if round % 4 == 1 {
                images.remove(&ids[round / 2]);
            }
            let mut seen = HashSet::new();
            assert!(images.list().iter().all(|i| seen.insert(i.name.clone())));
        }
    }

    #[test]
    fn test_remove_releases_preview_and_current() {
        let mut images = ImageCollection::default();
        let a = images.add(png("a.png")).unwrap();
        let b = images.add(png("b.png")).unwrap();
        assert!(images.set_current(Some(&a.id)));

        images.remove(&a.id);
        assert!(images.current().is_none());
        assert_eq!(images.live_previews(), 1);
        assert_eq!(images.list()[0].id, b.id);

        // unknown id is a no-op
        images.remove("missing");
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut images = ImageCollection::default();
        let a = images.add(png("a.png")).unwrap();
        images.add(png("b.png")).unwrap();
        images.set_current(Some(&a.id));

        images.clear();
        assert!(images.is_empty());
        assert!(images.current().is_none());
        assert_eq!(images.live_previews(), 0);
    }

    #[test]
    fn test_mark_persisted_and_pending() {
        let mut images = ImageCollection::default();
        let a = images.add(png("a.png")).unwrap();
        let b = images.add(png("b.png")).unwrap();

        images.mark_persisted(&a.id, "uploads/a.png");
        images.mark_persisted("missing", "uploads/none.png");

        assert_eq!(images.get(&a.id).unwrap().remote_path.as_deref(), Some("uploads/a.png"));
        let pending: Vec<_> = images.pending().into_iter().map(|i| i.id).collect();
        assert_eq!(pending, vec![b.id]);
    }

    #[test]
    fn test_restore_drops_payloads() {
        let mut images = ImageCollection::default();
        let a = images.add(png("a.png")).unwrap();
        images.mark_persisted(&a.id, "uploads/a.png");
        let records = images.records();

        let mut restored = ImageCollection::default();
        restored.restore(records);
        let image = &restored.list()[0];
        assert_eq!(image.id, a.id);
        assert_eq!(image.remote_path.as_deref(), Some("uploads/a.png"));
        assert!(image.payload.is_none());
        assert_eq!(restored.live_previews(), 1);
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("a.svg")), "image/svg+xml");
        assert_eq!(media_type_for_path(Path::new("notes")), "application/octet-stream");
    }
}
