//! Passcode persistence.
//!
//! The passcode lives in a JSON array on disk. Slot 0 is the current
//! passcode; older values follow it, up to the configured history limit.
//! The file is loaded once when the store is opened and rewritten in full
//! on every save.
//!
//! Loading is tolerant: a missing, empty, unreadable, or malformed file
//! yields an empty list, which reads as "no passcode configured".

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{LatchError, LatchResult};

/// Where the passcode file lives, and what to seed it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Persisted passcode list, inside app-private storage.
    pub file: PathBuf,
    /// Default list bundled with the application. Copied to `file` the
    /// first time the store is opened.
    pub seed: Option<PathBuf>,
}

impl StoragePaths {
    pub fn new(data_dir: &Path, file_name: &str) -> Self {
        Self {
            file: data_dir.join(file_name),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: impl Into<PathBuf>) -> Self {
        self.seed = Some(seed.into());
        self
    }
}

pub struct PasscodeStorage {
    path: PathBuf,
    entries: Vec<Value>,
    history_limit: usize,
}

impl PasscodeStorage {
    /// Open the store, seeding the file from the bundled default if needed.
    ///
    /// Never fails: problems are logged and the store starts empty.
    pub fn open(paths: &StoragePaths, history_limit: usize) -> Self {
        if !paths.file.exists() {
            if let Some(seed) = paths.seed.as_deref() {
                seed_from(seed, &paths.file);
            }
        }

        let entries = load_entries(&paths.file);
        debug!(
            "Opened passcode storage at {:?} ({} entries)",
            paths.file,
            entries.len()
        );

        Self {
            path: paths.file.clone(),
            entries,
            history_limit: history_limit.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current passcode, if slot 0 holds a string.
    pub fn read_passcode(&self) -> Option<&str> {
        self.entries.first().and_then(Value::as_str)
    }

    pub fn is_set(&self) -> bool {
        self.read_passcode().is_some()
    }

    /// Make `passcode` the current value and write the list to disk.
    ///
    /// The in-memory list is only updated once the write succeeded.
    pub fn save_passcode(&mut self, passcode: &str) -> LatchResult<()> {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.push(Value::String(passcode.to_owned()));
        entries.extend(self.entries.iter().cloned());
        entries.truncate(self.history_limit);

        write_entries(&self.path, &entries)?;
        self.entries = entries;

        info!("Passcode saved ({} entries kept)", self.entries.len());
        Ok(())
    }

    /// Delete the passcode file and forget every stored value.
    ///
    /// Returns `Ok(())` if the file doesn't exist.
    pub fn clear(&mut self) -> LatchResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| {
                LatchError::Storage(format!("Failed to delete passcode file: {}", e))
            })?;
        }
        self.entries.clear();
        info!("Passcode storage cleared");
        Ok(())
    }
}

impl std::fmt::Debug for PasscodeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log passcodes
        f.debug_struct("PasscodeStorage")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

fn seed_from(seed: &Path, target: &Path) {
    if !seed.exists() {
        debug!("No passcode seed at {:?}", seed);
        return;
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Could not create passcode directory {:?}: {}", parent, e);
            return;
        }
    }

    match std::fs::copy(seed, target) {
        Ok(_) => info!("Seeded passcode storage from {:?}", seed),
        Err(e) => warn!("Failed to seed passcode storage from {:?}: {}", seed, e),
    }
}

fn load_entries(path: &Path) -> Vec<Value> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read passcode file {:?}: {}", path, e);
            return Vec::new();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("Passcode file {:?} is not a list, starting empty", path);
            Vec::new()
        }
        Err(e) => {
            warn!("Passcode file {:?} is corrupted, starting empty: {}", path, e);
            Vec::new()
        }
    }
}

fn write_entries(path: &Path, entries: &[Value]) -> LatchResult<()> {
    let storage_err =
        |e: std::io::Error| LatchError::Storage(format!("Failed to write passcode file: {}", e));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(storage_err)?;
    }

    let content = serde_json::to_vec_pretty(entries)?;

    // Write atomically (write to temp file, then rename)
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    std::fs::write(&temp_path, &content).map_err(storage_err)?;
    std::fs::rename(&temp_path, path).map_err(storage_err)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &tempfile::TempDir) -> StoragePaths {
        StoragePaths::new(dir.path(), "latch.json")
    }

    #[test]
    fn test_empty_store_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = PasscodeStorage::open(&paths(&dir), 5);

        assert_eq!(storage.read_passcode(), None);
        assert!(!storage.is_set());
    }

    #[test]
    fn test_save_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 5);

        storage.save_passcode("4821").unwrap();
        assert_eq!(storage.read_passcode(), Some("4821"));

        let reopened = PasscodeStorage::open(&paths(&dir), 5);
        assert_eq!(reopened.read_passcode(), Some("4821"));
    }

    #[test]
    fn test_save_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 2);

        storage.save_passcode("1111").unwrap();
        storage.save_passcode("2222").unwrap();
        storage.save_passcode("3333").unwrap();

        let content = std::fs::read_to_string(dir.path().join("latch.json")).unwrap();
        let on_disk: Vec<String> = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk, vec!["3333".to_string(), "2222".to_string()]);
        assert_eq!(storage.read_passcode(), Some("3333"));
    }

    #[test]
    fn test_seed_copied_on_first_open() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, r#"["0000"]"#).unwrap();

        let data_dir = dir.path().join("data");
        let paths = StoragePaths::new(&data_dir, "latch.json").with_seed(&seed);
        let storage = PasscodeStorage::open(&paths, 5);

        assert!(data_dir.join("latch.json").exists());
        assert_eq!(storage.read_passcode(), Some("0000"));
    }

    #[test]
    fn test_seed_ignored_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, r#"["0000"]"#).unwrap();
        std::fs::write(dir.path().join("latch.json"), r#"["9876"]"#).unwrap();

        let storage = PasscodeStorage::open(&paths(&dir).with_seed(&seed), 5);
        assert_eq!(storage.read_passcode(), Some("9876"));
    }

    #[test]
    fn test_non_list_seed_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("Info.json");
        std::fs::write(&seed, r#"{ "CFBundleName": "Latch" }"#).unwrap();

        let storage = PasscodeStorage::open(&paths(&dir).with_seed(&seed), 5);
        assert_eq!(storage.read_passcode(), None);
    }

    #[test]
    fn test_corrupted_and_empty_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latch.json");

        std::fs::write(&file, "not json").unwrap();
        assert!(!PasscodeStorage::open(&paths(&dir), 5).is_set());

        std::fs::write(&file, "").unwrap();
        assert!(!PasscodeStorage::open(&paths(&dir), 5).is_set());
    }

    #[test]
    fn test_non_string_first_slot_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("latch.json"), r#"[42, "1234"]"#).unwrap();

        let storage = PasscodeStorage::open(&paths(&dir), 5);
        assert_eq!(storage.read_passcode(), None);
    }

    #[test]
    fn test_save_after_seeded_history_pushes_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("latch.json"), r#"[42]"#).unwrap();

        let mut storage = PasscodeStorage::open(&paths(&dir), 5);
        storage.save_passcode("1234").unwrap();
        assert_eq!(storage.read_passcode(), Some("1234"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 5);
        storage.save_passcode("1234").unwrap();

        storage.clear().unwrap();
        storage.clear().unwrap();

        assert!(!storage.is_set());
        assert!(!dir.path().join("latch.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 5);
        storage.save_passcode("1234").unwrap();

        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_debug_redacts_passcodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 5);
        storage.save_passcode("5555").unwrap();

        assert!(!format!("{:?}", storage).contains("5555"));
    }

    #[test]
    fn test_save_fails_when_data_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("data");
        std::fs::write(&not_a_dir, b"").unwrap();
        let mut storage = PasscodeStorage::open(&StoragePaths::new(&not_a_dir, "latch.json"), 5);

        let result = storage.save_passcode("2580");
        assert!(matches!(result, Err(LatchError::Storage(_))));
        assert!(!storage.is_set());
        assert!(std::fs::read(&not_a_dir).unwrap().is_empty());
    }

    #[test]
    fn test_failed_save_keeps_previous_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = PasscodeStorage::open(&paths(&dir), 5);
        storage.save_passcode("1111").unwrap();

        // A directory in the way of the temp file makes the next write fail.
        std::fs::create_dir(dir.path().join("latch.json.tmp")).unwrap();

        assert!(storage.save_passcode("2222").is_err());
        assert_eq!(storage.read_passcode(), Some("1111"));

        let reopened = PasscodeStorage::open(&paths(&dir), 5);
        assert_eq!(reopened.read_passcode(), Some("1111"));
    }
}
