use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use image::imageops::FilterType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IconError {
    #[error("unsupported or corrupt image upload")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which entity an icon belongs to. Picks the file-name suffix and the
/// square output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    User,
    Author,
}

impl IconKind {
    fn suffix(self) -> &'static str {
        match self {
            IconKind::User => "userIcon",
            IconKind::Author => "authorIcon",
        }
    }

    fn size(self) -> u32 {
        match self {
            IconKind::User => 100,
            IconKind::Author => 300,
        }
    }
}

/// Filesystem port for avatar images. Renames are not transactional with
/// the database write that records the file name; a crash between the two
/// can leave them out of step. Accepted limitation, kept behind this narrow
/// interface so a transactional object store could replace it.
#[derive(Clone)]
pub struct IconStore {
    dir: Arc<PathBuf>,
}

impl IconStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
        }
    }

    /// The stored file name for a given owner key (username or handle).
    pub fn file_name(key: &str, kind: IconKind) -> String {
        format!("{}_{}.jpeg", key, kind.suffix())
    }

    /// Decode an uploaded image, resize it square, and persist it under the
    /// owner's key. Returns the file name to record in the database.
    pub fn store(&self, key: &str, kind: IconKind, bytes: &[u8]) -> Result<String, IconError> {
        let filename = Self::file_name(key, kind);
        let side = kind.size();
        let resized = image::load_from_memory(bytes)?.resize_exact(side, side, FilterType::Lanczos3);

        fs::create_dir_all(self.dir.as_ref())?;
        resized.to_rgb8().save(self.dir.join(&filename))?;
        Ok(filename)
    }

    /// Move an existing icon to a new owner key, e.g. after a handle change.
    /// A missing source file is logged and skipped, matching how uploads
    /// that predate the rename feature behave; the new name is returned
    /// either way so the database stays consistent with future uploads.
    pub fn rename(&self, old_key: &str, new_key: &str, kind: IconKind) -> String {
        let from = self.dir.join(Self::file_name(old_key, kind));
        let to = self.dir.join(Self::file_name(new_key, kind));

        if let Err(err) = fs::rename(&from, &to) {
            tracing::warn!("could not rename icon {}: {}", from.display(), err);
        }

        Self::file_name(new_key, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn temp_store(tag: &str) -> IconStore {
        let dir = std::env::temp_dir().join(format!("tigerlilly-icons-{}-{}", tag, std::process::id()));
        IconStore::new(dir)
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(4, 4);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn file_names_follow_the_key_and_kind() {
        assert_eq!(IconStore::file_name("lilly", IconKind::User), "lilly_userIcon.jpeg");
        assert_eq!(
            IconStore::file_name("thejohnsonator", IconKind::Author),
            "thejohnsonator_authorIcon.jpeg"
        );
    }

    #[test]
    fn store_then_rename_moves_the_file() {
        let store = temp_store("rename");
        let stored = store.store("oldhandle", IconKind::Author, &png_bytes()).unwrap();
        assert_eq!(stored, "oldhandle_authorIcon.jpeg");

        let renamed = store.rename("oldhandle", "newhandle", IconKind::Author);
        assert_eq!(renamed, "newhandle_authorIcon.jpeg");
        assert!(store.dir.join("newhandle_authorIcon.jpeg").exists());
        assert!(!store.dir.join("oldhandle_authorIcon.jpeg").exists());
    }

    #[test]
    fn rename_without_a_source_still_returns_the_new_name() {
        let store = temp_store("missing");
        let renamed = store.rename("ghost", "phantom", IconKind::User);
        assert_eq!(renamed, "phantom_userIcon.jpeg");
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let store = temp_store("garbage");
        let err = store.store("whoever", IconKind::User, b"not an image").unwrap_err();
        assert!(matches!(err, IconError::Decode(_)));
    }
}
