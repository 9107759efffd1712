//! Build context packing.
//!
//! Packs a directory into the gzipped tar archive the engine's build endpoint
//! expects, excluding secret source files and `.dockerignore` entries. Ignore
//! entries are resolved to absolute paths before comparison, so relative
//! entries match regardless of how the walk reaches them.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::errors::FarError;

/// Read a `.dockerignore`-style exclusion file: newline-separated relative
/// paths, trimmed. A missing file yields no entries.
pub fn load_ignore_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Pack `dir` into a gzipped tar archive, skipping every path in `ignore`.
///
/// Returns the archive bytes and the context-relative paths that were
/// excluded.
pub fn pack_build_context(
    dir: &Path,
    ignore: &[PathBuf],
) -> Result<(Vec<u8>, Vec<PathBuf>), FarError> {
    let ignored: HashSet<PathBuf> = ignore
        .iter()
        .filter_map(|p| std::path::absolute(p).ok())
        .collect();

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut excluded = Vec::new();

    append_dir(&mut builder, dir, dir, &ignored, &mut excluded)?;

    let encoder = builder
        .into_inner()
        .map_err(|e| FarError::EngineError(format!("failed to finish build context: {e}")))?;
    let bytes = encoder
        .finish()
        .map_err(|e| FarError::EngineError(format!("failed to compress build context: {e}")))?;
    Ok((bytes, excluded))
}

fn append_dir(
    builder: &mut tar::Builder<GzEncoder<Vec<u8>>>,
    root: &Path,
    dir: &Path,
    ignored: &HashSet<PathBuf>,
    excluded: &mut Vec<PathBuf>,
) -> Result<(), FarError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| FarError::EngineError(e.to_string()))?
            .to_path_buf();

        if let Ok(absolute) = std::path::absolute(&path) {
            if ignored.contains(&absolute) {
                excluded.push(relative);
                continue;
            }
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            builder.append_dir(&relative, &path)?;
            append_dir(builder, root, &path, ignored, excluded)?;
        } else {
            builder.append_path_with_name(&path, &relative)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Write;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("far-context-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(path: &Path, contents: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn archive_paths(bytes: &[u8]) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_pack_excludes_ignored_paths() {
        let dir = scratch_dir("ignore");
        write_file(&dir.join("Dockerfile"), "FROM alpine\n");
        write_file(&dir.join("secret.key"), "hunter2\n");
        fs::create_dir(dir.join("src")).unwrap();
        write_file(&dir.join("src/main.txt"), "hello\n");

        let (bytes, excluded) =
            pack_build_context(&dir, &[dir.join("secret.key")]).unwrap();
        let paths = archive_paths(&bytes);

        assert!(paths.iter().any(|p| p == "Dockerfile"));
        assert!(paths.iter().any(|p| p.trim_end_matches('/') == "src"));
        assert!(paths.iter().any(|p| p == "src/main.txt"));
        assert!(!paths.iter().any(|p| p.contains("secret.key")));
        assert_eq!(excluded, vec![PathBuf::from("secret.key")]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_pack_excludes_whole_directories() {
        let dir = scratch_dir("dirs");
        write_file(&dir.join("Dockerfile"), "FROM alpine\n");
        fs::create_dir(dir.join("node_modules")).unwrap();
        write_file(&dir.join("node_modules/big.txt"), "x\n");

        let (bytes, excluded) =
            pack_build_context(&dir, &[dir.join("node_modules")]).unwrap();
        let paths = archive_paths(&bytes);

        assert!(!paths.iter().any(|p| p.contains("node_modules")));
        assert_eq!(excluded, vec![PathBuf::from("node_modules")]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_ignore_file_trims_lines() {
        let dir = scratch_dir("dockerignore");
        write_file(&dir.join(".dockerignore"), "  target \n\n.git\n");

        let entries = load_ignore_file(&dir.join(".dockerignore"));
        assert_eq!(entries, vec!["target".to_string(), ".git".to_string()]);

        assert!(load_ignore_file(&dir.join("missing")).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}
