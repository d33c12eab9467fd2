use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CoreError;

/// One source file of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Path below the root it was collected from.
    pub relative: PathBuf,
    pub contents: String,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let path = path.into();
        SourceUnit {
            relative: path.clone(),
            path,
            contents: contents.into(),
        }
    }
}

/// Collect the files under `root` that `accept` claims, in file name order.
/// A `root` that is itself a file is loaded whether or not it is claimed.
pub fn load_sources(
    root: impl AsRef<Path>,
    accept: impl Fn(&Path) -> bool,
) -> Result<Vec<SourceUnit>, CoreError> {
    let root = root.as_ref();
    if root.is_file() {
        let contents = fs::read_to_string(root)?;
        let relative = root.file_name().map(PathBuf::from).unwrap_or_default();
        return Ok(vec![SourceUnit {
            path: root.to_path_buf(),
            relative,
            contents,
        }]);
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| CoreError::SourceIo(err.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !accept(path) {
            continue;
        }
        let contents = fs::read_to_string(path)?;
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        units.push(SourceUnit {
            path: path.to_path_buf(),
            relative,
            contents,
        });
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lamina(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "lm")
    }

    #[test]
    fn collects_claimed_files_in_name_order() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("b.lm"), "class B {\n}\n").expect("write");
        fs::write(dir.path().join("a.lm"), "class A {\n}\n").expect("write");
        fs::write(dir.path().join("nested/c.lm"), "class C {\n}\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let units = load_sources(dir.path(), lamina).expect("load");
        let relative: Vec<_> = units.iter().map(|unit| unit.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.lm"),
                PathBuf::from("b.lm"),
                Path::new("nested").join("c.lm"),
            ]
        );
        assert_eq!(units[0].contents, "class A {\n}\n");
    }

    #[test]
    fn single_files_are_loaded_directly() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("Main.unknown");
        fs::write(&path, "class Main {\n}\n").expect("write");
        let units = load_sources(&path, lamina).expect("load");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].relative, PathBuf::from("Main.unknown"));
    }

    #[test]
    fn missing_roots_are_io_errors() {
        let dir = tempdir().expect("tempdir");
        let err = load_sources(dir.path().join("absent"), lamina).unwrap_err();
        assert!(matches!(err, CoreError::SourceIo(_)));
    }
}
