//! Walks the video folder and turns file names into catalog entries.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::catalog::{MediaEntry, NO_POSTER, NO_SYNOPSIS};
use crate::error::Result;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv"];

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern is valid"));

static RELEASE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:1080p|720p|2160p|4k|bluray|h264|x264|h265|x265|web-dl)\b.*")
        .expect("release tag pattern is valid")
});

/// Title and year guessed from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<String>,
}

/// Returns `true` when `ext` (without the dot) is a video extension, ignoring case.
pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext))
}

/// `The.Matrix.1999.1080p.BluRay.mkv` becomes `The Matrix` / `1999`.
pub fn parse_filename(filename: &str) -> ParsedTitle {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let clean = stem.replace(['.', '_'], " ");

    let mut years = YEAR.find_iter(&clean);
    let Some(first) = years.next() else {
        return ParsedTitle { title: strip_release_tags(&clean), year: None };
    };

    let before = title_before(&clean, first.start());
    if !before.is_empty() {
        return ParsedTitle { title: before, year: Some(first.as_str().to_string()) };
    }

    // the name leads with a year, e.g. "2001 A Space Odyssey 1968"
    match years.next() {
        Some(second) => ParsedTitle {
            title: title_before(&clean, second.start()),
            year: Some(second.as_str().to_string()),
        },
        None => ParsedTitle { title: strip_release_tags(&clean), year: None },
    }
}

fn title_before(name: &str, end: usize) -> String {
    name[..end]
        .trim_end_matches(|c: char| c.is_whitespace() || "([-".contains(c))
        .trim()
        .to_string()
}

fn strip_release_tags(name: &str) -> String {
    RELEASE_TAGS.replace(name, "").trim().to_string()
}

/// Recursively collects every video under `dir` as a catalog entry with
/// placeholder metadata and ids counting from 1. A missing directory yields
/// no entries.
pub fn scan_videos(dir: &Path) -> Result<Vec<MediaEntry>> {
    if !dir.exists() {
        tracing::warn!("video folder {} not found", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !is_video_extension(ext) {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        let ParsedTitle { title, year } = parse_filename(&filename);
        tracing::debug!(%title, ?year, "found {}", path.display());

        let size = entry.metadata()?.len();
        entries.push(MediaEntry {
            id: entries.len() as u64 + 1,
            title,
            year,
            filename,
            path: std::path::absolute(path)?,
            size_mb: size_mb(size),
            extension: format!(".{ext}"),
            description: NO_SYNOPSIS.to_string(),
            poster_url: NO_POSTER.to_string(),
            backdrop_url: String::new(),
            rating: None,
        });
    }

    tracing::info!(videos = entries.len(), "scanned {}", dir.display());
    Ok(entries)
}

/// Megabytes rounded to two decimals.
fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn parsed(title: &str, year: Option<&str>) -> ParsedTitle {
        ParsedTitle { title: title.to_string(), year: year.map(str::to_string) }
    }

    #[test]
    fn title_and_year() {
        assert_eq!(parsed("The Matrix", Some("1999")), parse_filename("The.Matrix.1999.1080p.BluRay.mkv"));
        assert_eq!(parsed("Heat", Some("1995")), parse_filename("Heat_1995.mp4"));
        assert_eq!(parsed("Blade Runner", Some("1982")), parse_filename("Blade Runner (1982).avi"));
    }

    #[test]
    fn release_tags_without_year() {
        assert_eq!(parsed("Alien", None), parse_filename("Alien.720p.x264-GROUP.mkv"));
        assert_eq!(parsed("Dune Part Two", None), parse_filename("Dune_Part_Two.WEB-DL.mp4"));
        assert_eq!(parsed("Home Movie", None), parse_filename("Home.Movie.mov"));
    }

    #[test]
    fn leading_year_keeps_title() {
        assert_eq!(
            parsed("2001 A Space Odyssey", Some("1968")),
            parse_filename("2001.A.Space.Odyssey.1968.2160p.mkv")
        );
        assert_eq!(parsed("1917", Some("2019")), parse_filename("1917.2019.mkv"));
        assert_eq!(parsed("1917", None), parse_filename("1917.mkv"));
    }

    #[test]
    fn year_must_stand_alone() {
        assert_eq!(parsed("Room 21999", None), parse_filename("Room.21999.mp4"));
    }

    #[test]
    fn video_extensions() {
        assert!(is_video_extension("mp4"));
        assert!(is_video_extension("MKV"));
        assert!(!is_video_extension("srt"));
        assert!(!is_video_extension(""));
    }

    #[test]
    fn size_rounding() {
        assert_eq!(0.0, size_mb(0));
        assert_eq!(1.0, size_mb(1024 * 1024));
        assert_eq!(1.5, size_mb(1024 * 1024 * 3 / 2));
    }

    #[test]
    fn scans_nested_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a.Heat.1995.mkv"), vec![0u8; 2048]).unwrap();
        fs::write(dir.path().join("b").join("The.Matrix.1999.MP4"), b"x").unwrap();
        fs::write(dir.path().join("b").join("The.Matrix.1999.srt"), b"subs").unwrap();

        let entries = scan_videos(dir.path()).unwrap();
        assert_eq!(2, entries.len());

        assert_eq!(1, entries[0].id);
        assert_eq!("a Heat", entries[0].title);
        assert_eq!(".mkv", entries[0].extension);
        assert!(entries[0].path.is_absolute());

        assert_eq!(2, entries[1].id);
        assert_eq!("The Matrix", entries[1].title);
        assert_eq!(Some("1999".to_string()), entries[1].year);
        assert_eq!(".MP4", entries[1].extension);
        assert_eq!(NO_SYNOPSIS, entries[1].description);
    }

    #[test]
    fn missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_videos(&dir.path().join("nope")).unwrap().is_empty());
    }
}
