use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content).with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Classify a media file by extension, sniffing the header when the extension says nothing
    pub fn detect_media_kind<P: AsRef<Path>>(path: P) -> MediaKind {
        let path = path.as_ref();

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            let kind = MediaKind::from_extension(&ext);
            if kind != MediaKind::Unknown {
                return kind;
            }
        }

        let mut header = [0u8; 12];
        let read = fs::File::open(path).and_then(|mut f| f.read(&mut header)).unwrap_or(0);
        MediaKind::from_magic(&header[..read])
    }

    /// Remove run directories under `root` untouched for longer than `max_age`.
    ///
    /// Only direct children are considered. Returns how many were removed.
    pub fn sweep_stale_dirs<P: AsRef<Path>>(root: P, max_age: Duration) -> Result<usize> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;

        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(now);
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    debug!("Removed stale work directory {:?}", entry.path());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove stale work directory {:?}: {}", entry.path(), e),
            }
        }

        Ok(removed)
    }

    /// Per-run working directory path under `root`
    pub fn run_dir<P: AsRef<Path>>(root: P, run_id: &uuid::Uuid) -> PathBuf {
        root.as_ref().join(run_id.to_string())
    }
}

/// Kinds of media a section or narration can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image, rendered with a pan/zoom
    Image,
    /// Video, trimmed or looped
    Video,
    /// Audio track
    Audio,
    /// Subtitle file
    Subtitle,
    /// Unknown file type
    Unknown,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif" | "tif" | "tiff" => Self::Image,
            "mp4" | "mkv" | "avi" | "mov" | "wmv" | "flv" | "webm" | "m4v" | "mpg" | "mpeg" | "ts" => Self::Video,
            "mp3" | "wav" | "ogg" | "flac" | "m4a" | "aac" | "opus" => Self::Audio,
            "srt" | "ass" | "vtt" => Self::Subtitle,
            _ => Self::Unknown,
        }
    }

    fn from_magic(header: &[u8]) -> Self {
        match header {
            [0x89, b'P', b'N', b'G', ..] | [0xFF, 0xD8, 0xFF, ..] | [b'G', b'I', b'F', b'8', ..] => Self::Image,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Self::Image,
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Self::Audio,
            [b'I', b'D', b'3', ..] | [b'f', b'L', b'a', b'C', ..] | [b'O', b'g', b'g', b'S', ..] => Self::Audio,
            [_, _, _, _, b'f', b't', b'y', b'p', ..] | [0x1A, 0x45, 0xDF, 0xA3, ..] => Self::Video,
            _ => Self::Unknown,
        }
    }
}
