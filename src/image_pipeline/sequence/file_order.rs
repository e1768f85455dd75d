//! Input discovery: extension dispatch and natural file ordering.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};

/// Decoder family selected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Headerless packed dump; needs a rawtype.
    PackedRaw,
    B16,
    Tiff,
    /// Vendor RAW still decoded by rawloader.
    CameraRaw,
}

const PACKED_RAW_EXTENSIONS: &[&str] = &["raw"];
const B16_EXTENSIONS: &[&str] = &["b16", "b16dat"];
const TIFF_EXTENSIONS: &[&str] = &["tif", "tiff"];
const CAMERA_RAW_EXTENSIONS: &[&str] = &["dng", "arw", "cr2", "nef", "raf", "orf", "rw2"];
const MOVIE_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// `Ok(None)` for files no decoder knows.
pub fn classify(path: &Path) -> Result<Option<InputKind>> {
    let Some(ext) = extension_of(path) else {
        return Ok(None);
    };
    let ext = ext.as_str();
    if MOVIE_EXTENSIONS.contains(&ext) {
        return Err(ImageError::UnsupportedFormat(format!(
            "movie container `.{ext}` ({}); movies are not decoded",
            path.display()
        )));
    }
    let kind = if PACKED_RAW_EXTENSIONS.contains(&ext) {
        Some(InputKind::PackedRaw)
    } else if B16_EXTENSIONS.contains(&ext) {
        Some(InputKind::B16)
    } else if TIFF_EXTENSIONS.contains(&ext) {
        Some(InputKind::Tiff)
    } else if CAMERA_RAW_EXTENSIONS.contains(&ext) {
        Some(InputKind::CameraRaw)
    } else {
        None
    };
    Ok(kind)
}

/// Orders names the way people number files: digit runs compare by value, so
/// `frame2` sorts before `frame10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let (da, ra) = split_digits(a);
                let (db, rb) = split_digits(b);
                let (ta, tb) = (da.trim_start_matches('0'), db.trim_start_matches('0'));
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| da.len().cmp(&db.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = ra;
                b = rb;
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                a = &a[ca.len_utf8()..];
                b = &b[cb.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

pub fn sort_naturally(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(file_name(a), file_name(b)));
}

/// Resolves `path` (a file or a directory) to the files of a single input kind.
///
/// In a directory the first recognised extension in natural order wins, and only
/// files sharing that exact extension are kept.
pub fn list_inputs(path: &Path) -> Result<(InputKind, Vec<PathBuf>)> {
    if !path.exists() {
        return Err(ImageError::InputReadError(format!(
            "specified path does not exist: {}",
            path.display()
        )));
    }

    if path.is_file() {
        let kind = classify(path)?.ok_or_else(|| unrecognised(path))?;
        return Ok((kind, vec![path.to_path_buf()]));
    }

    let mut entries = std::fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.retain(|p| p.is_file());
    sort_naturally(&mut entries);

    let mut chosen = None;
    for entry in &entries {
        if let Some(kind) = classify(entry)? {
            chosen = Some((kind, extension_of(entry)));
            break;
        }
    }
    let Some((kind, ext)) = chosen else {
        return Err(unrecognised(path));
    };

    entries.retain(|p| extension_of(p) == ext);
    debug!(
        files = entries.len(),
        ext = ext.as_deref().unwrap_or_default(),
        "Found input files"
    );
    Ok((kind, entries))
}

fn unrecognised(path: &Path) -> ImageError {
    ImageError::UnsupportedFormat(format!("no recognised image files at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["img10.tif", "img2.tif", "img1.tif", "img02.tif", "IMG3.tif", "img.tif"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["IMG3.tif", "img.tif", "img1.tif", "img2.tif", "img02.tif", "img10.tif"]);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(natural_cmp("frame_99", "frame_100"), Ordering::Less);
        assert_eq!(natural_cmp("frame_0100", "frame_99"), Ordering::Greater);
        assert_eq!(natural_cmp("a1b2", "a1b2"), Ordering::Equal);
        assert_eq!(natural_cmp("a1b10", "a1b9"), Ordering::Greater);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("x/shot.RAW")).unwrap(), Some(InputKind::PackedRaw));
        assert_eq!(classify(Path::new("x/piv.b16dat")).unwrap(), Some(InputKind::B16));
        assert_eq!(classify(Path::new("x/still.tiff")).unwrap(), Some(InputKind::Tiff));
        assert_eq!(classify(Path::new("x/photo.arw")).unwrap(), Some(InputKind::CameraRaw));
        assert_eq!(classify(Path::new("x/notes.txt")).unwrap(), None);
        assert!(matches!(
            classify(Path::new("x/clip.mp4")),
            Err(ImageError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_list_directory_keeps_first_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_10.tif", "b_9.tif", "b_1.tif", "readme.txt", "b_5.tiff"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let (kind, files) = list_inputs(dir.path()).unwrap();
        assert_eq!(kind, InputKind::Tiff);
        let names: Vec<&str> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["b_1.tif", "b_9.tif", "b_10.tif"]);
    }

    #[test]
    fn test_list_missing_path() {
        assert!(matches!(
            list_inputs(Path::new("/definitely/not/here")),
            Err(ImageError::InputReadError(_))
        ));
    }
}
