use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::classify::Category;

/// How generated file names are derived for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingScheme {
    /// `extracted_frame_<n>` with n counted from 1.
    Frame,
    /// `<container>_block<n>`, n counting the blocks written for that
    /// container from 0.
    Block { container: String },
}

impl NamingScheme {
    /// Name a task writes its payload under. Frame names are final; block
    /// names are staged until the orchestrator assigns the block counter.
    pub fn task_file_name(&self, index: usize, extension: &str) -> String {
        match self {
            NamingScheme::Frame => {
                with_extension(format!("extracted_frame_{}", index + 1), extension)
            }
            NamingScheme::Block { container } => format!(".{container}_frame{index}.partial"),
        }
    }

    /// Final name of the `block`-th block written for the container; `None`
    /// when task names are already final.
    pub fn block_file_name(&self, block: usize, extension: &str) -> Option<String> {
        match self {
            NamingScheme::Frame => None,
            NamingScheme::Block { container } => {
                Some(with_extension(format!("{container}_block{block}"), extension))
            }
        }
    }
}

fn with_extension(stem: String, extension: &str) -> String {
    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Writes `bytes` to `<root>/<category>/<name>`, creating the category
    /// directory on first use. An existing file with the same name is
    /// replaced.
    pub fn write(&self, category: Category, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let dir = self.root.join(category.as_str());
        // create_dir_all tolerates a concurrent creator winning the race.
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(path)
    }

    /// Renames a staged file to `name` inside the same category directory.
    pub fn promote(&self, staged: &Path, name: &str) -> std::io::Result<PathBuf> {
        let target = staged.with_file_name(name);
        std::fs::rename(staged, &target)?;
        Ok(target)
    }
}

/// Ensure the output root exists, is a directory and accepts writes.
pub fn ensure_output_dir(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        if !std::fs::metadata(path)?.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("output path is not a directory: {}", path.display()),
            ));
        }
    } else {
        std::fs::create_dir_all(path)?;
    }

    let probe_path = path.join(".npkcarve_write_probe");
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe_path)?;
    let _ = std::fs::remove_file(&probe_path);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path)?.permissions().mode();
        if mode & 0o002 != 0 {
            warn!("output directory is world-writable: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_are_one_based() {
        assert_eq!(NamingScheme::Frame.task_file_name(0, "png"), "extracted_frame_1.png");
        assert_eq!(NamingScheme::Frame.task_file_name(41, ""), "extracted_frame_42");
        assert_eq!(NamingScheme::Frame.block_file_name(0, "png"), None);
    }

    #[test]
    fn block_names_carry_container() {
        let scheme = NamingScheme::Block {
            container: "a1b2c3d4".to_string(),
        };
        assert_eq!(scheme.task_file_name(3, "wem"), ".a1b2c3d4_frame3.partial");
        assert_eq!(scheme.block_file_name(1, "wem").as_deref(), Some("a1b2c3d4_block1.wem"));
        assert_eq!(scheme.block_file_name(0, "").as_deref(), Some("a1b2c3d4_block0"));
    }

    #[test]
    fn writes_into_category_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = OutputWriter::new(dir.path());
        let path = writer
            .write(Category::Image, "extracted_frame_1.png", b"\x89PNG")
            .expect("write");
        assert_eq!(path, dir.path().join("image").join("extracted_frame_1.png"));
        assert_eq!(std::fs::read(&path).expect("read"), b"\x89PNG");

        // same name again overwrites
        writer
            .write(Category::Image, "extracted_frame_1.png", b"new")
            .expect("rewrite");
        assert_eq!(std::fs::read(&path).expect("read"), b"new");
    }

    #[test]
    fn promote_renames_within_category() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = OutputWriter::new(dir.path());
        let staged = writer
            .write(Category::Audio, ".a1b2c3d4_frame7.partial", b"BKHD")
            .expect("write");
        let path = writer.promote(&staged, "a1b2c3d4_block0.bnk").expect("promote");
        assert_eq!(path, dir.path().join("audio").join("a1b2c3d4_block0.bnk"));
        assert!(!staged.exists());
        assert_eq!(std::fs::read(&path).expect("read"), b"BKHD");
    }

    #[test]
    fn concurrent_writers_share_category_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = std::sync::Arc::new(OutputWriter::new(dir.path()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    writer
                        .write(Category::Audio, &format!("f{i}.wem"), b"RIFF")
                        .expect("write")
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        let count = std::fs::read_dir(dir.path().join("audio")).expect("dir").count();
        assert_eq!(count, 8);
    }

    #[test]
    fn output_dir_must_be_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").expect("write");
        assert!(ensure_output_dir(&file).is_err());

        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested).expect("create nested");
        assert!(nested.is_dir());
        assert!(!nested.join(".npkcarve_write_probe").exists());
    }
}
