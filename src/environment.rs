// src/environment.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::Result;

/// A flat scratch directory holding copies of the submitted files, entered as
/// the process working directory.
///
/// Dropping the guard moves back to the previous working directory and
/// deletes the copies and the directory, whether the run finished or bailed.
pub struct TestEnvironment {
    dir: Option<TempDir>,
    previous_dir: PathBuf,
    copied: Vec<PathBuf>,
    entered: bool,
}

/// Create a fresh directory, copy `files` into it by basename, and `cd` there.
pub fn scoped_test_environment(files: &[PathBuf]) -> Result<TestEnvironment> {
    let previous_dir = env::current_dir()?;
    let dir = tempfile::Builder::new().prefix("coursework-").tempdir()?;

    let root = dir.path().to_path_buf();

    let mut environment = TestEnvironment {
        dir: Some(dir),
        previous_dir,
        copied: Vec::with_capacity(files.len()),
        entered: false,
    };

    for file in files {
        let Some(name) = file.file_name() else {
            log::warn!("skipping submitted path without a file name: {}", file.display());
            continue;
        };
        let target = root.join(name);
        fs::copy(file, &target)?;
        environment.copied.push(target);
    }

    env::set_current_dir(&root)?;
    environment.entered = true;
    log::debug!("entered test environment {} with {} files", root.display(), environment.copied.len());

    Ok(environment)
}

impl TestEnvironment {
    pub fn path(&self) -> &Path {
        self.dir.as_ref().map(TempDir::path).unwrap_or(&self.previous_dir)
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        if self.entered {
            if let Err(e) = env::set_current_dir(&self.previous_dir) {
                log::error!("failed to restore working directory {}: {}", self.previous_dir.display(), e);
            }
        }

        for file in &self.copied {
            if let Err(e) = fs::remove_file(file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove {}: {}", file.display(), e);
                }
            }
        }

        // Anything the grading code created goes with the directory.
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("failed to remove test environment {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn submitted(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_environment_is_flat_and_temporary() {
        let source = tempfile::tempdir().unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        let files = vec![
            submitted(source.path(), "main.c", "int main() {}"),
            submitted(&source.path().join("nested"), "notes.txt", "hi"),
        ];
        let before = env::current_dir().unwrap();

        let root = {
            let environment = scoped_test_environment(&files).unwrap();
            let root = environment.path().to_path_buf();

            assert_eq!(env::current_dir().unwrap().canonicalize().unwrap(), root.canonicalize().unwrap());
            assert_eq!(fs::read_to_string("main.c").unwrap(), "int main() {}");
            assert_eq!(fs::read_to_string("notes.txt").unwrap(), "hi");
            fs::write("scratch.o", "junk").unwrap();
            root
        };

        assert_eq!(env::current_dir().unwrap(), before);
        assert!(!root.exists());
        // Originals are untouched.
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    #[serial]
    fn test_environment_restores_after_panic() {
        let source = tempfile::tempdir().unwrap();
        let files = vec![submitted(source.path(), "main.py", "print(1)")];
        let before = env::current_dir().unwrap();
        let mut root = PathBuf::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let environment = scoped_test_environment(&files).unwrap();
            root = environment.path().to_path_buf();
            panic!("grading blew up");
        }));

        assert!(outcome.is_err());
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(!root.as_os_str().is_empty());
        assert!(!root.exists());
    }

    #[test]
    #[serial]
    fn test_missing_file_leaves_nothing_behind() {
        let before = env::current_dir().unwrap();
        let result = scoped_test_environment(&[PathBuf::from("/definitely/not/here.txt")]);

        assert!(result.is_err());
        assert_eq!(env::current_dir().unwrap(), before);
    }
}
