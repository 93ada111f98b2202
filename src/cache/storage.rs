//! Snapshot storage trait and CSV implementation.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::traits::{Cacheable, SnapshotKey};

/// Errors from reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
  /// No snapshot has been written for this key yet
  #[error("no snapshot for {key}")]
  NotFound { key: String },
  /// The snapshot exists but cannot be parsed
  #[error("snapshot {key} is corrupt: {reason}")]
  Corrupt { key: String, reason: String },
  /// The storage medium itself failed
  #[error("snapshot {key} I/O failed: {source}")]
  Io {
    key: String,
    #[source]
    source: std::io::Error,
  },
}

impl SnapshotError {
  /// Whether the caller should carry on as if the snapshot were empty.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::NotFound { .. } | Self::Corrupt { .. })
  }
}

/// Trait for snapshot storage backends.
pub trait SnapshotStorage: Send + Sync + 'static {
  type Item: Cacheable;

  /// Read the snapshot stored under `key`.
  fn read<K: SnapshotKey>(&self, key: &K) -> Result<Vec<Self::Item>, SnapshotError>;

  /// Replace the snapshot stored under `key`.
  fn write<K: SnapshotKey>(&self, key: &K, items: &[Self::Item]) -> Result<(), SnapshotError>;
}

/// Item that can be stored as one CSV record.
pub trait CsvRecord: Cacheable {
  /// Row shape used when reading a record back.
  type Row: DeserializeOwned;

  /// Header for a file holding `items`, in column order.
  fn header(items: &[Self]) -> &'static [&'static str];

  /// Text of a single column for this item.
  fn field(&self, column: &str) -> String;

  /// Rebuild the item from a parsed row.
  fn from_row(row: Self::Row) -> Result<Self, String>;
}

/// Storage implementation that doesn't keep anything.
/// Used when snapshots are disabled - every read misses, every write is dropped.
pub struct NoopStorage<T> {
  _item: PhantomData<fn() -> T>,
}

impl<T> Default for NoopStorage<T> {
  fn default() -> Self {
    Self { _item: PhantomData }
  }
}

impl<T: Cacheable> SnapshotStorage for NoopStorage<T> {
  type Item = T;

  fn read<K: SnapshotKey>(&self, key: &K) -> Result<Vec<T>, SnapshotError> {
    Err(SnapshotError::NotFound {
      key: key.description(),
    })
  }

  fn write<K: SnapshotKey>(&self, _key: &K, _items: &[T]) -> Result<(), SnapshotError> {
    Ok(()) // Discard
  }
}

/// CSV-file snapshot storage, one file per key.
pub struct CsvStorage<T> {
  dir: PathBuf,
  _item: PhantomData<fn() -> T>,
}

impl<T: CsvRecord> CsvStorage<T> {
  /// Create storage rooted at `dir`. The directory is created on first write.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      _item: PhantomData,
    }
  }

  fn path_for<K: SnapshotKey>(&self, key: &K) -> PathBuf {
    self.dir.join(format!("{}.csv", key.file_stem()))
  }
}

impl<T: CsvRecord> SnapshotStorage for CsvStorage<T> {
  type Item = T;

  fn read<K: SnapshotKey>(&self, key: &K) -> Result<Vec<T>, SnapshotError> {
    let path = self.path_for(key);
    let file = File::open(&path).map_err(|e| match e.kind() {
      ErrorKind::NotFound => SnapshotError::NotFound {
        key: key.description(),
      },
      _ => SnapshotError::Io {
        key: key.description(),
        source: e,
      },
    })?;

    let mut reader = csv::Reader::from_reader(file);
    let mut items = Vec::new();
    for (line, row) in reader.deserialize::<T::Row>().enumerate() {
      let corrupt = |reason: String| SnapshotError::Corrupt {
        key: key.description(),
        reason: format!("record {}: {}", line + 1, reason),
      };
      let row = row.map_err(|e| corrupt(e.to_string()))?;
      items.push(T::from_row(row).map_err(corrupt)?);
    }

    tracing::debug!(
      "Read {} items from snapshot {}",
      items.len(),
      path.display()
    );
    Ok(items)
  }

  fn write<K: SnapshotKey>(&self, key: &K, items: &[T]) -> Result<(), SnapshotError> {
    let io_error = |source: std::io::Error| SnapshotError::Io {
      key: key.description(),
      source,
    };

    std::fs::create_dir_all(&self.dir).map_err(io_error)?;

    // Write beside the target and rename over it so readers never see a partial file
    let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
    {
      let mut writer = csv::Writer::from_writer(&mut tmp);
      let header = T::header(items);
      writer
        .write_record(header)
        .map_err(|e| io_error(e.into()))?;
      for item in items {
        writer
          .write_record(header.iter().map(|column| item.field(column)))
          .map_err(|e| io_error(e.into()))?;
      }
      writer.flush().map_err(io_error)?;
    }

    let path = self.path_for(key);
    tmp.persist(&path).map_err(|e| io_error(e.error))?;

    tracing::info!("Wrote {} items to snapshot {}", items.len(), path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, Clone, PartialEq)]
  struct Note {
    id: String,
    text: Option<String>,
    pinned: bool,
  }

  #[derive(Deserialize)]
  struct NoteRow {
    id: String,
    text: Option<String>,
    pinned: String,
  }

  impl Cacheable for Note {
    fn cache_key(&self) -> &str {
      &self.id
    }
  }

  impl CsvRecord for Note {
    type Row = NoteRow;

    fn header(_items: &[Self]) -> &'static [&'static str] {
      &["id", "text", "pinned"]
    }

    fn field(&self, column: &str) -> String {
      match column {
        "id" => self.id.clone(),
        "text" => self.text.clone().unwrap_or_default(),
        "pinned" => self.pinned.to_string(),
        _ => String::new(),
      }
    }

    fn from_row(row: NoteRow) -> Result<Self, String> {
      if row.id.is_empty() {
        return Err("empty id".to_string());
      }
      Ok(Note {
        id: row.id,
        text: row.text,
        pinned: row.pinned == "true",
      })
    }
  }

  #[derive(Clone)]
  struct Key(&'static str);

  impl SnapshotKey for Key {
    fn file_stem(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      format!("notes {}", self.0)
    }
  }

  fn note(id: &str, text: Option<&str>, pinned: bool) -> Note {
    Note {
      id: id.to_string(),
      text: text.map(String::from),
      pinned,
    }
  }

  #[test]
  fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let storage = CsvStorage::<Note>::new(dir.path());

    let err = storage.read(&Key("nobody")).unwrap_err();
    assert!(matches!(err, SnapshotError::NotFound { .. }));
    assert!(err.is_recoverable());
  }

  #[test]
  fn test_write_then_read_preserves_order_and_fields() {
    let dir = tempfile::tempdir().unwrap();
    let storage = CsvStorage::<Note>::new(dir.path().join("nested"));
    let notes = vec![
      note("b", Some("hello, world"), true),
      note("a", None, false),
      note("c", Some("quote \" inside"), false),
    ];

    storage.write(&Key("k"), &notes).unwrap();
    let read = storage.read(&Key("k")).unwrap();

    assert_eq!(read, notes);
  }

  #[test]
  fn test_write_replaces_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let storage = CsvStorage::<Note>::new(dir.path());

    storage
      .write(&Key("k"), &[note("a", None, true), note("b", None, true)])
      .unwrap();
    storage.write(&Key("k"), &[note("c", None, false)]).unwrap();

    let read = storage.read(&Key("k")).unwrap();
    assert_eq!(read, vec![note("c", None, false)]);
  }

  #[test]
  fn test_unknown_flag_literal_reads_as_false() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
      dir.path().join("k.csv"),
      "id,text,pinned\na,,TRUE\nb,,yes\nc,,true\n",
    )
    .unwrap();
    let storage = CsvStorage::<Note>::new(dir.path());

    let read = storage.read(&Key("k")).unwrap();
    let flags: Vec<bool> = read.iter().map(|n| n.pinned).collect();
    assert_eq!(flags, vec![false, false, true]);
  }

  #[test]
  fn test_unparsable_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("k.csv"), "foo,bar\n1,2\n").unwrap();
    let storage = CsvStorage::<Note>::new(dir.path());

    let err = storage.read(&Key("k")).unwrap_err();
    assert!(matches!(err, SnapshotError::Corrupt { .. }));
    assert!(err.is_recoverable());
  }

  #[test]
  fn test_row_rejected_by_item_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("k.csv"), "id,text,pinned\n,x,true\n").unwrap();
    let storage = CsvStorage::<Note>::new(dir.path());

    let err = storage.read(&Key("k")).unwrap_err();
    assert!(matches!(err, SnapshotError::Corrupt { .. }));
  }

  #[test]
  fn test_noop_storage_never_returns_data() {
    let storage = NoopStorage::<Note>::default();
    storage.write(&Key("k"), &[note("a", None, true)]).unwrap();
    assert!(matches!(
      storage.read(&Key("k")),
      Err(SnapshotError::NotFound { .. })
    ));
  }
}
