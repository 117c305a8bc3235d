use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use snapsolve_contracts::{QueueKind, ScreenshotQueues, ScreenshotRef, View};
use thiserror::Error;

use crate::error::SolveError;

pub const PREVIEW_MAX_EDGE: u32 = 320;
const PREVIEW_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("screenshot not found: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("failed to decode screenshot {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Owns the screenshot directory and the queues that index it.
///
/// Every file that leaves a queue (eviction, delete, clear) is removed from disk.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
    queues: ScreenshotQueues,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>, max_len: usize) -> Self {
        Self {
            dir: dir.into(),
            queues: ScreenshotQueues::new(max_len),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn queues(&self) -> &ScreenshotQueues {
        &self.queues
    }

    pub fn view(&self) -> View {
        self.queues.view()
    }

    pub fn set_view(&mut self, view: View) {
        self.queues.set_view(view);
    }

    /// Copies `source` into the screenshot directory under a fresh name and
    /// queues it on the active queue.
    pub fn import(&mut self, source: &Path) -> StoreResult<ScreenshotRef> {
        if !source.is_file() {
            return Err(StoreError::MissingSource(source.to_path_buf()));
        }
        fs::create_dir_all(&self.dir)?;
        let ext = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "png".to_string());
        let target = self.dir.join(format!("{}.{ext}", uuid::Uuid::new_v4()));
        fs::copy(source, &target)?;
        match self.add(target.clone()) {
            Ok(shot) => Ok(shot),
            Err(err) => {
                remove_file_if_exists(&target)?;
                Err(err)
            }
        }
    }

    /// Queues a file that already lives where it should.
    pub fn add(&mut self, path: PathBuf) -> StoreResult<ScreenshotRef> {
        let preview = build_preview(&path)?;
        let shot = ScreenshotRef::new(path).with_preview(preview);
        let evicted = self.queues.enqueue(shot.clone());
        self.discard(&evicted);
        tracing::debug!(
            path = %shot.path.display(),
            queue = ?self.queues.active_kind(),
            evicted = evicted.len(),
            "screenshot queued"
        );
        Ok(shot)
    }

    pub fn list(&self) -> Vec<ScreenshotRef> {
        self.queues.list()
    }

    pub fn main_paths(&self) -> Vec<PathBuf> {
        self.queues.paths(QueueKind::Main)
    }

    pub fn extra_paths(&self) -> Vec<PathBuf> {
        self.queues.paths(QueueKind::Extra)
    }

    /// Drops `path` from the queues and deletes the file. `Ok(false)` when the
    /// path was not queued.
    pub fn delete(&mut self, path: &Path) -> StoreResult<bool> {
        if !self.queues.remove(path) {
            return Ok(false);
        }
        remove_file_if_exists(path)?;
        Ok(true)
    }

    pub fn clear_extra(&mut self) -> usize {
        let removed = self.queues.clear_extra();
        self.discard(&removed);
        removed.len()
    }

    pub fn clear_all(&mut self) -> usize {
        let removed = self.queues.clear_all();
        self.discard(&removed);
        removed.len()
    }

    fn discard(&self, shots: &[ScreenshotRef]) {
        for shot in shots {
            if let Err(err) = remove_file_if_exists(&shot.path) {
                tracing::warn!(?err, path = %shot.path.display(), "failed to delete screenshot");
            }
        }
    }
}

/// Reads a screenshot and returns it base64-encoded for the backend.
pub fn encode_screenshot(path: &Path) -> Result<String, SolveError> {
    let bytes = fs::read(path).map_err(|source| SolveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BASE64.encode(bytes))
}

pub fn encode_screenshots(paths: &[PathBuf]) -> Result<Vec<String>, SolveError> {
    paths.iter().map(|path| encode_screenshot(path)).collect()
}

/// JPEG thumbnail no larger than `PREVIEW_MAX_EDGE` on either side.
pub fn build_preview(path: &Path) -> StoreResult<Vec<u8>> {
    let image = image::open(path).map_err(|source| StoreError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let thumb = image.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(thumb.to_rgb8())
        .write_with_encoder(JpegEncoder::new_with_quality(
            &mut bytes,
            PREVIEW_JPEG_QUALITY,
        ))
        .map_err(|source| StoreError::Image {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(bytes)
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use base64::Engine as _;
    use image::{Rgb, RgbImage};
    use snapsolve_contracts::View;

    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) -> anyhow::Result<()> {
        let mut image = RgbImage::new(width, height);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([200, 40, 40]);
        }
        image.save(path)?;
        Ok(())
    }

    #[test]
    fn import_copies_file_and_builds_small_preview() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("capture.png");
        write_png(&source, 1280, 720)?;
        let mut store = ScreenshotStore::new(temp.path().join("shots"), 5);

        let shot = store.import(&source)?;

        assert!(shot.path.starts_with(store.dir()));
        assert!(shot.path.exists());
        assert!(source.exists());
        let preview = image::load_from_memory(&shot.preview)?;
        assert!(preview.width() <= PREVIEW_MAX_EDGE && preview.height() <= PREVIEW_MAX_EDGE);
        assert_eq!(store.main_paths(), vec![shot.path.clone()]);
        Ok(())
    }

    #[test]
    fn evicted_screenshots_are_deleted_from_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("capture.png");
        write_png(&source, 8, 8)?;
        let mut store = ScreenshotStore::new(temp.path().join("shots"), 2);

        let first = store.import(&source)?;
        store.import(&source)?;
        store.import(&source)?;

        assert!(!first.path.exists());
        assert_eq!(store.main_paths().len(), 2);
        assert_eq!(fs::read_dir(store.dir())?.count(), 2);
        Ok(())
    }

    #[test]
    fn import_rejects_missing_and_undecodable_sources() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = ScreenshotStore::new(temp.path().join("shots"), 5);

        let missing = store.import(&temp.path().join("nope.png")).unwrap_err();
        assert!(matches!(missing, StoreError::MissingSource(_)));

        let junk = temp.path().join("junk.png");
        fs::write(&junk, b"not an image")?;
        let undecodable = store.import(&junk).unwrap_err();
        assert!(matches!(undecodable, StoreError::Image { .. }));
        assert_eq!(fs::read_dir(store.dir())?.count(), 0);
        assert!(store.list().is_empty());
        Ok(())
    }

    #[test]
    fn solutions_view_routes_imports_to_extra_queue() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("capture.png");
        write_png(&source, 8, 8)?;
        let mut store = ScreenshotStore::new(temp.path().join("shots"), 5);

        store.import(&source)?;
        store.set_view(View::Solutions);
        let extra = store.import(&source)?;

        assert_eq!(store.extra_paths(), vec![extra.path.clone()]);
        assert_eq!(store.list(), vec![extra.clone()]);
        assert_eq!(store.clear_extra(), 1);
        assert!(!extra.path.exists());
        assert_eq!(store.main_paths().len(), 1);
        Ok(())
    }

    #[test]
    fn delete_removes_file_and_reports_unknown_paths() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("capture.png");
        write_png(&source, 8, 8)?;
        let mut store = ScreenshotStore::new(temp.path().join("shots"), 5);
        let shot = store.import(&source)?;

        assert!(store.delete(&shot.path)?);
        assert!(!shot.path.exists());
        assert!(!store.delete(&shot.path)?);
        assert!(!store.delete(&PathBuf::from("/never/queued.png"))?);
        Ok(())
    }

    #[test]
    fn encode_screenshot_round_trips_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("raw.bin");
        fs::write(&path, b"hello")?;

        let encoded = encode_screenshot(&path)?;
        assert_eq!(BASE64.decode(encoded)?, b"hello");

        let err = encode_screenshots(&[temp.path().join("gone.png")]).unwrap_err();
        assert!(matches!(err, SolveError::Io { .. }));
        Ok(())
    }
}
