//! Byte-addressed file I/O for one table's data file.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use strata_common::Result;

/// An open data file.
///
/// Seeks and the read or write that follows happen under one lock, so
/// concurrent callers never interleave inside a transfer.
pub struct DataFile {
    /// Path the file was opened with.
    path: PathBuf,
    /// The file handle.
    file: Mutex<File>,
    /// Sync to stable storage after every write.
    fsync_enabled: bool,
}

impl DataFile {
    /// Opens or creates the file at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, fsync_enabled: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            fsync_enabled,
        })
    }

    /// Returns the path the file was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    /// Returns true if the file holds no bytes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fills `buf` from `offset`. Bytes past end of file read as zero.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf[filled..].fill(0);

        Ok(())
    }

    /// Writes all of `data` at `offset`, extending the file if needed.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;

        if self.fsync_enabled {
            file.sync_data()?;
        }

        Ok(())
    }

    /// Flushes all written data to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("path", &self.path)
            .field("fsync_enabled", &self.fsync_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_file() -> (DataFile, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let file = DataFile::open(dir.path().join("table.dat"), false).unwrap();
        (file, dir)
    }

    #[test]
    fn test_data_file_open_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("t.dat");
        let file = DataFile::open(&path, false).unwrap();
        assert!(path.exists());
        assert_eq!(file.path(), path.as_path());
        assert!(file.is_empty().unwrap());
    }

    #[test]
    fn test_data_file_write_read() {
        let (file, _dir) = create_test_file();

        let mut data = vec![0u8; 512];
        data[0] = 0xAB;
        data[511] = 0xEF;
        file.write_at(512, &data).unwrap();
        assert_eq!(file.len().unwrap(), 1024);

        let mut read = vec![0xFFu8; 512];
        file.read_at(512, &mut read).unwrap();
        assert_eq!(read, data);

        // The gap before the first write reads as zeros.
        file.read_at(0, &mut read).unwrap();
        assert!(read.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_data_file_read_past_end_zero_fills() {
        let (file, _dir) = create_test_file();
        file.write_at(0, &[1, 2, 3]).unwrap();

        let mut buf = [0xFFu8; 8];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 0, 0, 0, 0, 0]);

        file.read_at(100, &mut buf).unwrap();
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_data_file_overwrite() {
        let (file, _dir) = create_test_file();
        file.write_at(0, &[0xAA; 16]).unwrap();
        file.write_at(4, &[0xBB; 4]).unwrap();

        let mut buf = [0u8; 16];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[0xAA; 4]);
        assert_eq!(&buf[4..8], &[0xBB; 4]);
        assert_eq!(&buf[8..], &[0xAA; 8]);
        assert_eq!(file.len().unwrap(), 16);
    }

    #[test]
    fn test_data_file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.dat");

        {
            let file = DataFile::open(&path, true).unwrap();
            file.write_at(0, &[0xFF; 32]).unwrap();
            file.sync().unwrap();
        }

        let file = DataFile::open(&path, true).unwrap();
        assert_eq!(file.len().unwrap(), 32);
        let mut buf = [0u8; 32];
        file.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 32]);
    }
}
