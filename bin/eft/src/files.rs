//! Discovery and loading of JSON input files.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// A JSON file found under an input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// The path of the file.
    pub path: PathBuf,
    /// The path relative to the input root. Files given directly keep their file name.
    pub relative: PathBuf,
}

/// Returns every `*.json` file under `root`, sorted. A file `root` is returned as is.
pub async fn json_files(root: &Path) -> Result<Vec<InputFile>> {
    let metadata = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("reading {}", root.display()))?;
    if metadata.is_file() {
        let relative = root.file_name().map_or_else(|| root.to_path_buf(), PathBuf::from);
        return Ok(vec![InputFile { path: root.to_path_buf(), relative }]);
    }

    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("reading {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                dirs.push(path);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                files.push(InputFile { path, relative });
            }
        }
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Reads and parses the JSON file at `path`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&contents).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("z.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a/b/c.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a/readme.md"), "").unwrap();

        let files = json_files(dir.path()).await.unwrap();
        let relative = files.iter().map(|f| f.relative.clone()).collect::<Vec<_>>();
        assert_eq!(relative, vec![PathBuf::from("a/b/c.json"), PathBuf::from("z.json")]);
        assert_eq!(files[0].path, dir.path().join("a/b/c.json"));

        let single = dir.path().join("z.json");
        assert_eq!(
            json_files(&single).await.unwrap(),
            vec![InputFile { path: single.clone(), relative: PathBuf::from("z.json") }]
        );
        assert!(json_files(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();
        let value: BTreeMap<String, u64> = read_json(&path).await.unwrap();
        assert_eq!(value["a"], 1);

        std::fs::write(&path, "{").unwrap();
        let err = read_json::<BTreeMap<String, u64>>(&path).await.unwrap_err();
        assert!(err.to_string().starts_with("parsing"));
    }
}
