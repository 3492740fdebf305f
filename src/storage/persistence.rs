//! Write-Ahead Logging (WAL) and snapshot files for the blog store

use super::table::Tables;
use crate::core::{BlogError, BlogResult, Category, Comment, Post, PostId, User};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// WAL Entry Types
// ============================================================================

/// A single row mutation. Inserts and updates are both `Put*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    PutUser(User),
    PutCategory(Category),
    PutPost(Post),
    DeletePost(PostId),
    PutComment(Comment),
}

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub tables: Tables,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: u64,
    pub row_count: usize,
}

impl StoreSnapshot {
    pub fn new(tables: Tables) -> Self {
        let row_count = tables.row_count();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            version: 1,
            tables,
            metadata: SnapshotMetadata { created_at, row_count },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every WAL append
    Sync,
    /// flush to the OS, no fsync
    #[default]
    Async,
    /// no files at all
    None,
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" | "off" => Ok(Self::None),
            other => Err(format!(
                "unknown durability mode '{other}', expected one of: sync, async, none"
            )),
        }
    }
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> BlogError {
    BlogError::storage(format!("{context}: {err}"))
}

// ============================================================================
// WAL Manager
// ============================================================================

#[derive(Debug, Default)]
pub struct WalContents {
    pub entries: Vec<WalEntry>,
    pub valid_len: u64,
    /// Bytes after the last complete entry.
    pub torn_bytes: u64,
}

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<BufWriter<File>>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> BlogResult<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| storage_err("Failed to create WAL directory", e))?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| storage_err("Failed to open WAL file", e))?;
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 500,
        })
    }

    pub fn append(&mut self, entry: &WalEntry) -> BlogResult<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| BlogError::storage("WAL file not initialized"))?;
        let serialized =
            rmp_serde::to_vec(entry).map_err(|e| storage_err("Failed to serialize WAL entry", e))?;
        let len = serialized.len() as u32;
        file.write_all(&len.to_le_bytes())
            .map_err(|e| storage_err("Failed to write WAL", e))?;
        file.write_all(&serialized)
            .map_err(|e| storage_err("Failed to write WAL", e))?;
        file.flush().map_err(|e| storage_err("Failed to flush WAL", e))?;
        if self.durability_mode == DurabilityMode::Sync {
            file.get_mut()
                .sync_all()
                .map_err(|e| storage_err("Failed to sync WAL", e))?;
        }
        self.entries_since_checkpoint += 1;
        Ok(())
    }

    pub fn read_all(&self) -> BlogResult<Vec<WalEntry>> {
        Ok(self.read_contents()?.entries)
    }

    /// Reads every complete entry; `valid_len` is the byte offset just past the last one.
    pub fn read_contents(&self) -> BlogResult<WalContents> {
        let mut contents = WalContents::default();
        if !self.wal_path.exists() {
            return Ok(contents);
        }
        let file = File::open(&self.wal_path)
            .map_err(|e| storage_err("Failed to open WAL for reading", e))?;
        let file_len = file
            .metadata()
            .map_err(|e| storage_err("Failed to stat WAL", e))?
            .len();
        let mut reader = BufReader::new(file);
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(storage_err("Failed to read WAL entry length", e)),
            }
            let len = u32::from_le_bytes(len_bytes) as u64;
            // torn tail from a crash mid-append
            if contents.valid_len + 4 + len > file_len {
                break;
            }
            let mut data = vec![0u8; len as usize];
            reader
                .read_exact(&mut data)
                .map_err(|e| storage_err("Failed to read WAL entry data", e))?;
            let entry: WalEntry = rmp_serde::from_slice(&data)
                .map_err(|e| storage_err("Failed to deserialize WAL entry", e))?;
            contents.entries.push(entry);
            contents.valid_len += 4 + len;
        }
        contents.torn_bytes = file_len - contents.valid_len;
        Ok(contents)
    }

    /// Cuts the file back to `len` bytes; later appends continue from there.
    pub fn truncate_to(&mut self, len: u64) -> BlogResult<()> {
        if let Some(writer) = self.wal_file.as_mut() {
            writer
                .flush()
                .map_err(|e| storage_err("Failed to flush WAL", e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .open(&self.wal_path)
            .map_err(|e| storage_err("Failed to open WAL for truncation", e))?;
        file.set_len(len)
            .map_err(|e| storage_err("Failed to truncate WAL", e))?;
        file.sync_all()
            .map_err(|e| storage_err("Failed to sync WAL", e))?;
        Ok(())
    }

    pub fn clear(&mut self) -> BlogResult<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        self.wal_file = None;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .map_err(|e| storage_err("Failed to truncate WAL", e))?;
        // reopen in append mode so later writes land at the end
        drop(file);
        let file = OpenOptions::new()
            .append(true)
            .open(&self.wal_path)
            .map_err(|e| storage_err("Failed to reopen WAL", e))?;
        self.wal_file = Some(BufWriter::new(file));
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Writes the snapshot to a temp file in the same directory, then renames it over the old one.
    pub fn save(&self, snapshot: &StoreSnapshot) -> BlogResult<()> {
        let parent = self
            .snapshot_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)
            .map_err(|e| storage_err("Failed to create snapshot directory", e))?;

        let serialized =
            rmp_serde::to_vec(snapshot).map_err(|e| storage_err("Failed to serialize snapshot", e))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| storage_err("Failed to create temp file", e))?;
        temp_file
            .write_all(&serialized)
            .map_err(|e| storage_err("Failed to write snapshot", e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| storage_err("Failed to sync snapshot", e))?;
        temp_file
            .persist(&self.snapshot_path)
            .map_err(|e| storage_err("Failed to rename snapshot", e))?;
        Ok(())
    }

    pub fn load(&self) -> BlogResult<Option<StoreSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| storage_err("Failed to open snapshot", e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| storage_err("Failed to read snapshot", e))?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)
            .map_err(|e| storage_err("Failed to deserialize snapshot", e))?;
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> BlogResult<Self> {
        let data_dir = data_dir.as_ref();
        let wal_path = data_dir.join("memoblog.wal");
        let snapshot_path = data_dir.join("memoblog.snapshot");
        let wal = WalManager::new(wal_path, durability_mode)?;
        let snapshot = SnapshotManager::new(snapshot_path);
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
        })
    }

    pub fn log(&mut self, entry: &WalEntry) -> BlogResult<()> {
        self.wal.append(entry)
    }

    pub fn checkpoint(&mut self, tables: &Tables) -> BlogResult<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = StoreSnapshot::new(tables.clone());
        self.snapshot.save(&snapshot)?;
        self.wal.clear()?;
        tracing::debug!(rows = snapshot.metadata.row_count, "store checkpoint written");
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Loads the last snapshot and replays the WAL on top of it.
    ///
    /// A partial entry left by a crash is cut off so new appends start on a
    /// clean entry boundary.
    pub fn recover(&mut self) -> BlogResult<Option<Tables>> {
        let snapshot = self.snapshot.load()?;
        let contents = self.wal.read_contents()?;

        if contents.torn_bytes > 0 {
            tracing::warn!(
                torn_bytes = contents.torn_bytes,
                valid_len = contents.valid_len,
                "truncating incomplete WAL tail"
            );
            self.wal.truncate_to(contents.valid_len)?;
        }

        if snapshot.is_none() && contents.entries.is_empty() {
            return Ok(None);
        }

        let mut tables = snapshot.map(|s| s.tables).unwrap_or_default();
        let replayed = contents.entries.len();
        for entry in contents.entries {
            tables.apply(entry);
        }

        tracing::info!(replayed, rows = tables.row_count(), "store recovered");
        Ok(Some(tables))
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}
