use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::{ensure_parent_is_tip, Storage};
use crate::Digest;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Directory-backed block storage.
///
/// Files:
/// - `blocks/<hex digest>.bin`: one encoded block per file
/// - `tip`: hex digest of the most recently saved block
/// - `difficulty`: decimal difficulty the chain was created with
/// - `*.tmp`: temporary files for atomic writes
///
/// There is no file lock. The parent check in `save_block` reads `tip` and then
/// writes, so two processes sharing a directory can both pass it; only writers
/// going through one `FileStorage` value are serialized by `&mut self`.
pub struct FileStorage {
    blocks_dir: PathBuf,
    tip_path: PathBuf,
    difficulty_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with paths from config
    pub fn new(config: &Config) -> Self {
        FileStorage {
            blocks_dir: config.get_blocks_dir(),
            tip_path: config.get_tip_path(),
            difficulty_path: config.get_difficulty_path(),
        }
    }

    /// Create FileStorage rooted at `dir` (for testing)
    pub fn with_dir(dir: &Path) -> Self {
        FileStorage {
            blocks_dir: dir.join("blocks"),
            tip_path: dir.join("tip"),
            difficulty_path: dir.join("difficulty"),
        }
    }

    fn block_path(&self, digest: &[u8]) -> PathBuf {
        self.blocks_dir.join(format!("{}.bin", hex::encode(digest)))
    }

    /// Ensure the data directory exists
    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.blocks_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))
    }

    /// Write to a temporary file, fsync, rename over `path`, fsync the parent.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("tmp");

        let mut file = File::create(&tmp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;
        file.write_all(bytes)
            .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to fsync temp file: {}", e)))?;
        drop(file);

        fs::rename(&tmp_path, path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))?;

        if let Some(parent) = path.parent() {
            let parent_file = File::open(parent)
                .map_err(|e| Error::Storage(format!("Failed to open parent directory: {}", e)))?;
            parent_file
                .sync_all()
                .map_err(|e| Error::Storage(format!("Failed to fsync parent directory: {}", e)))?;
        }

        Ok(())
    }
}

impl Storage for FileStorage {
    fn last_hash(&self) -> Result<Option<Digest>> {
        let text = match fs::read_to_string(&self.tip_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("Failed to read tip: {}", e))),
        };
        let tip = hex::decode(text.trim())
            .map_err(|e| Error::Storage(format!("Corrupt tip file: {}", e)))?;
        // The empty digest is the genesis link, never a valid tip
        if tip.is_empty() {
            return Err(Error::Storage("Corrupt tip file: empty digest".to_string()));
        }
        Ok(Some(tip))
    }

    fn get(&self, digest: &[u8]) -> Result<Vec<u8>> {
        match fs::read(self.block_path(digest)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(hex::encode(digest))),
            Err(e) => Err(Error::Storage(format!("Failed to read block: {}", e))),
        }
    }

    fn save_block(&mut self, digest: &[u8], bytes: &[u8], parent: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        ensure_parent_is_tip(self.last_hash()?.as_deref(), parent)?;

        // Block first, tip second: a crash in between leaves an unreachable block, never a dangling tip
        Self::write_atomic(&self.block_path(digest), bytes)?;
        Self::write_atomic(&self.tip_path, hex::encode(digest).as_bytes())?;

        Ok(())
    }

    fn difficulty(&self) -> Result<Option<u32>> {
        let text = match fs::read_to_string(&self.difficulty_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("Failed to read difficulty: {}", e))),
        };
        let difficulty: u32 = text
            .trim()
            .parse()
            .map_err(|e| Error::Storage(format!("Corrupt difficulty file: {}", e)))?;
        Ok(Some(difficulty))
    }

    fn record_difficulty(&mut self, difficulty: u32) -> Result<()> {
        self.ensure_dir()?;
        Self::write_atomic(&self.difficulty_path, difficulty.to_string().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(temp_dir.path());
        (storage, temp_dir)
    }

    #[test]
    fn test_empty_directory() {
        let (storage, _temp_dir) = create_test_storage();
        assert_eq!(storage.last_hash().unwrap(), None);
        assert!(matches!(storage.get(&[0xaa]), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_save_and_get_block() {
        let (mut storage, _temp_dir) = create_test_storage();
        storage.save_block(&[0x01], b"genesis", &[]).unwrap();
        storage.save_block(&[0x02], b"next", &[0x01]).unwrap();

        assert_eq!(storage.get(&[0x01]).unwrap(), b"genesis");
        assert_eq!(storage.get(&[0x02]).unwrap(), b"next");
        assert_eq!(storage.last_hash().unwrap(), Some(vec![0x02]));
    }

    #[test]
    fn test_tip_survives_reopen() {
        let (mut storage, temp_dir) = create_test_storage();
        storage.save_block(&[0x0a, 0x0b], b"block", &[]).unwrap();
        drop(storage);

        let reopened = FileStorage::with_dir(temp_dir.path());
        assert_eq!(reopened.last_hash().unwrap(), Some(vec![0x0a, 0x0b]));
        assert_eq!(reopened.get(&[0x0a, 0x0b]).unwrap(), b"block");
    }

    #[test]
    fn test_stale_parent_rejected() {
        let (mut storage, _temp_dir) = create_test_storage();
        storage.save_block(&[0x01], b"genesis", &[]).unwrap();
        storage.save_block(&[0x02], b"a", &[0x01]).unwrap();

        let err = storage.save_block(&[0x03], b"b", &[0x01]).unwrap_err();
        assert!(matches!(err, Error::TipConflict { .. }));
        assert!(matches!(storage.get(&[0x03]), Err(Error::NotFound(_))));
        assert_eq!(storage.last_hash().unwrap(), Some(vec![0x02]));
    }

    #[test]
    fn test_corrupt_tip_file() {
        let (mut storage, temp_dir) = create_test_storage();
        storage.save_block(&[0x01], b"genesis", &[]).unwrap();
        fs::write(temp_dir.path().join("tip"), "not hex").unwrap();
        assert!(matches!(storage.last_hash(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_empty_tip_file_is_corrupt() {
        let (mut storage, temp_dir) = create_test_storage();
        storage.save_block(&[0x01], b"genesis", &[]).unwrap();
        fs::write(temp_dir.path().join("tip"), "").unwrap();
        assert!(matches!(storage.last_hash(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_difficulty_survives_reopen() {
        let (mut storage, temp_dir) = create_test_storage();
        assert_eq!(storage.difficulty().unwrap(), None);
        storage.record_difficulty(8).unwrap();
        drop(storage);

        let reopened = FileStorage::with_dir(temp_dir.path());
        assert_eq!(reopened.difficulty().unwrap(), Some(8));

        fs::write(temp_dir.path().join("difficulty"), "eight").unwrap();
        assert!(matches!(reopened.difficulty(), Err(Error::Storage(_))));
    }

    #[test]
    fn test_no_temp_files_left() {
        let (mut storage, temp_dir) = create_test_storage();
        storage.save_block(&[0x01], b"genesis", &[]).unwrap();
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path().join("blocks"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert!(!temp_dir.path().join("tip.tmp").exists());
    }
}
