use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::Error;

/// Key-value persistence contract; the medium is the caller's choice.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());

        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        fs::write(self.path_for(key), value)?;

        Ok(())
    }
}

#[test]
fn test_memory_store_roundtrip() {
    let store = MemoryStore::new();

    assert_eq!(store.get("rides").unwrap(), None);

    store.set("rides", "[]").unwrap();
    assert_eq!(store.get("rides").unwrap(), Some("[]".to_string()));

    store.set("rides", "[1]").unwrap();
    assert_eq!(store.get("rides").unwrap(), Some("[1]".to_string()));
}

#[test]
fn test_file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path()).unwrap();

    assert_eq!(store.get("booking_history").unwrap(), None);

    store.set("booking_history", "[]").unwrap();
    assert_eq!(store.get("booking_history").unwrap(), Some("[]".to_string()));
}

#[test]
fn test_file_store_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("state").join("vectura");

    let store = FileStore::new(&nested).unwrap();
    store.set("transport_rides", "[]").unwrap();

    assert!(nested.join("transport_rides.json").exists());
}
