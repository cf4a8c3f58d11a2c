//! Single-file backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the scratch file written during [`StorageBackend::replace`].
const REPLACE_SUFFIX: &str = "compact";

/// A sink that can be cut back to a given length.
trait Truncatable: Write + Seek {
    fn cut(&mut self, len: u64) -> io::Result<()>;
}

impl Truncatable for File {
    fn cut(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes `data` at `offset`, cutting the sink back to `offset` if the write
/// fails partway so no torn bytes outlive the logical end.
fn write_at<F: Truncatable>(sink: &mut F, offset: u64, data: &[u8]) -> StorageResult<()> {
    sink.seek(SeekFrom::Start(offset))?;
    if let Err(err) = sink.write_all(data) {
        // The write error is the one to report.
        let _ = sink.cut(offset);
        return Err(err.into());
    }
    Ok(())
}

/// A backend over one file.
///
/// `flush` hands buffered bytes to the OS and `sync` waits for the disk.
/// `replace` writes a sibling scratch file, syncs it and renames it over the
/// original, so a crash leaves either the old or the new file in place.
///
/// ```no_run
/// use gymlog_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("journal.log")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileBackend {
    /// Opens the file at `path`, creating it if needed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = open_rw(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Like [`FileBackend::open`] but creates missing parent directories.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scratch_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(REPLACE_SUFFIX);
        PathBuf::from(name)
    }
}

fn open_rw(path: &Path) -> StorageResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.size,
            });
        }
        let mut buf = vec![0u8; len];
        if len > 0 {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }
        write_at(self.file.get_mut(), offset, data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.get_mut().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.get_mut().sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if new_size > self.size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: self.size,
            });
        }
        let file = self.file.get_mut();
        file.set_len(new_size)?;
        file.sync_all()?;
        self.size = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let scratch = self.scratch_path();
        {
            let mut out = File::create(&scratch)?;
            out.write_all(data)?;
            out.sync_all()?;
        }
        fs::rename(&scratch, &self.path)?;
        if let Some(parent) = self.path.parent() {
            // Directory fsync is unsupported on some platforms.
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        *self.file.get_mut() = open_rw(&self.path)?;
        self.size = data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_file_empty() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(&dir.path().join("journal.log")).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles").join("default").join("journal.log");
        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn appended_bytes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"press").unwrap();
            backend.append(b"-row").unwrap();
            backend.sync().unwrap();
        }
        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"press-row");
        assert_eq!(backend.read_at(5, 4).unwrap(), b"-row");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal.log")).unwrap();
        backend.append(b"abc").unwrap();
        assert!(matches!(
            backend.read_at(2, 2),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn truncate_then_append_continues_at_new_end() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal.log")).unwrap();
        backend.append(b"good|torn").unwrap();
        backend.truncate(5).unwrap();
        assert_eq!(backend.append(b"next").unwrap(), 5);
        assert_eq!(backend.read_all().unwrap(), b"good|next");
    }

    /// Accepts `capacity` bytes, then fails every write.
    struct ShortDisk {
        bytes: Vec<u8>,
        pos: usize,
        capacity: usize,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.pos);
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let end = self.pos + room.min(buf.len());
            if self.bytes.len() < end {
                self.bytes.resize(end, 0);
            }
            self.bytes[self.pos..end].copy_from_slice(&buf[..end - self.pos]);
            let written = end - self.pos;
            self.pos = end;
            Ok(written)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortDisk {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(at) => {
                    self.pos = at as usize;
                    Ok(at)
                }
                _ => Err(io::Error::new(io::ErrorKind::Other, "unsupported seek")),
            }
        }
    }

    impl Truncatable for ShortDisk {
        fn cut(&mut self, len: u64) -> io::Result<()> {
            self.bytes.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn torn_append_is_cut_back() {
        let mut disk = ShortDisk {
            bytes: b"good".to_vec(),
            pos: 0,
            capacity: 10,
        };
        assert!(write_at(&mut disk, 4, b"|a long record").is_err());
        assert_eq!(disk.bytes, b"good");

        disk.capacity = 64;
        write_at(&mut disk, 4, b"|ok").unwrap();
        assert_eq!(disk.bytes, b"good|ok");
    }

    #[test]
    fn replace_is_visible_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"a long history of edits").unwrap();
            backend.replace(b"snapshot").unwrap();
            assert_eq!(backend.size().unwrap(), 8);
            backend.append(b"+1").unwrap();
        }
        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"snapshot+1");
        assert!(!dir.path().join("journal.log.compact").exists());
    }
}
