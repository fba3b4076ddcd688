//! Input discovery and output naming

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Suffix of the note written next to a rejected input
pub const REJECTED_NOTE_SUFFIX: &str = ".rejected.txt";

/// Directory rejected inputs are moved into
pub const REJECTED_DIR: &str = "rejected";

const NOTE_SUFFIX: &str = ".note.mp4";
const REPORT_SUFFIX: &str = ".note.json";

/// Whether `path` looks like a candidate input: a visible regular file
/// that is not one of our own notes or reports.
pub fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name.ends_with(".partial") || is_output_name(name) {
        return false;
    }
    path.is_file()
}

fn is_output_name(name: &str) -> bool {
    [NOTE_SUFFIX, REPORT_SUFFIX, REJECTED_NOTE_SUFFIX]
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.to_ascii_lowercase().ends_with(suffix))
}

/// Expand files and directories into a sorted list of candidate inputs.
///
/// Directories are walked recursively. `rejected/` subdirectories and any
/// directory in `exclude` (typically an output directory nested inside an
/// input root) are skipped.
pub fn discover_inputs(roots: &[PathBuf], exclude: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let excluded: Vec<PathBuf> = exclude.iter().map(|p| comparable(p)).collect();
    let mut found = Vec::new();
    for root in roots {
        if root.is_file() {
            found.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("input does not exist: {}", root.display()),
            ));
        }
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !e.file_type().is_dir()
                    || (e.file_name() != REJECTED_DIR
                        && !excluded.contains(&comparable(e.path())))
            });
        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if is_candidate(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Canonical form when the path exists, so nested and relative spellings compare equal
fn comparable(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// File name of the note produced for `input`: `<stem>.note.mp4`
pub fn note_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video".to_string());
    format!("{}{}", stem, NOTE_SUFFIX)
}

/// Report written next to a note: `<stem>.note.json`
pub fn report_file_name(input: &Path) -> String {
    let note = note_file_name(input);
    format!("{}.json", note.trim_end_matches(".mp4"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_note_names() {
        assert_eq!(note_file_name(Path::new("/in/holiday.MOV")), "holiday.note.mp4");
        assert_eq!(report_file_name(Path::new("clip.mp4")), "clip.note.json");
        assert_eq!(note_file_name(Path::new("/")), "video.note.mp4");
    }

    #[test]
    fn test_discover_walks_and_skips() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::create_dir_all(root.join(REJECTED_DIR)).unwrap();
        std::fs::write(root.join("b.mp4"), b"x").unwrap();
        std::fs::write(root.join("nested/a.mov"), b"x").unwrap();
        std::fs::write(root.join(".hidden.mp4"), b"x").unwrap();
        std::fs::write(root.join("c.mp4.rejected.txt"), b"x").unwrap();
        std::fs::write(root.join(REJECTED_DIR).join("old.mp4"), b"x").unwrap();

        let found = discover_inputs(&[root.to_path_buf()], &[]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.mp4".to_string(), "nested/a.mov".to_string()]);
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover_inputs(&[dir.path().join("gone")], &[]).is_err());
    }

    #[test]
    fn test_own_outputs_are_not_inputs() {
        assert!(is_output_name("good.note.mp4"));
        assert!(is_output_name("good.note.json"));
        assert!(!is_output_name("notebook.mp4"));
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["good.mp4", "good.note.mp4", "good.note.json", "loud.NOTE.MP4"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }

        let found = discover_inputs(&[root.to_path_buf()], &[]).unwrap();
        assert_eq!(found, vec![root.join("good.mp4")]);
    }

    #[test]
    fn test_nested_output_dir_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let outbox = root.join("notes");
        std::fs::create_dir_all(&outbox).unwrap();
        std::fs::write(root.join("clip.mp4"), b"x").unwrap();
        // Named like an input, so only the directory exclusion keeps it out
        std::fs::write(outbox.join("earlier.mp4"), b"x").unwrap();

        let found = discover_inputs(&[root.to_path_buf()], &[outbox.clone()]).unwrap();
        assert_eq!(found, vec![root.join("clip.mp4")]);

        let relative_spelling = root.join("notes/../notes");
        let found = discover_inputs(&[root.to_path_buf()], &[relative_spelling]).unwrap();
        assert_eq!(found, vec![root.join("clip.mp4")]);
    }
}
