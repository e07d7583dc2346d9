use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

pub struct WalkEntry {
    pub path: PathBuf,
    pub relative_path: String,
}

pub struct FileWalker {
    root: PathBuf,
}

impl FileWalker {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Walks the root directory and returns every `.py` file, respecting
    /// `.gitignore` and a project-local `.flowignore`.
    pub fn walk(&self) -> Vec<WalkEntry> {
        let mut entries = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .add_custom_ignore_filename(".flowignore")
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(_) => continue,
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.into_path();
            if path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            entries.push(WalkEntry {
                path,
                relative_path,
            });
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_python_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.py"), "pass").unwrap();
        fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let walker = FileWalker::new(dir.path());
        let entries = walker.walk();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "src/main.py");
    }

    #[test]
    fn respects_flowignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/lib.py"), "pass").unwrap();
        fs::write(dir.path().join("app.py"), "pass").unwrap();
        fs::write(dir.path().join(".flowignore"), "vendor/\n").unwrap();

        let walker = FileWalker::new(dir.path());
        let entries = walker.walk();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "app.py");
    }

    #[test]
    fn respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.py"), "pass").unwrap();
        fs::write(dir.path().join("skip.py"), "pass").unwrap();
        fs::write(dir.path().join(".gitignore"), "skip.py\n").unwrap();

        let walker = FileWalker::new(dir.path());
        let entries = walker.walk();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "keep.py");
    }
}
