use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{PersistenceError, SessionSnapshot, SnapshotStore};
use tracing::debug;

/// One pretty-printed JSON file per slot under `root`.
#[derive(Debug, Clone)]
pub(crate) struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn slot_path(&self, slot: u32) -> PathBuf {
        self.root.join(format!("slot_{slot}.save.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save_slot(&mut self, slot: u32, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let path = self.slot_path(slot);
        let text = snapshot.to_json_pretty()?;
        write_text_atomic(&path, &text).map_err(|source| io_error("write save", &path, source))?;
        debug!(slot, path = %path.display(), bytes = text.len(), "slot_written");
        Ok(())
    }

    fn load_slot(&self, slot: u32) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let path = self.slot_path(slot);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error("read save", &path, source)),
        };
        Ok(Some(SessionSnapshot::from_json(&raw)?))
    }
}

fn io_error(operation: &'static str, path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        operation,
        path: path.display().to_string(),
        source,
    }
}

/// Writes to `<name>.tmp` next to the target, then renames over it.
fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text.as_bytes())?;
    replace_file(&tmp_path, path)
}

/// `fs::rename` replaces an existing target, so the previous slot stays intact
/// until the new file is in place.
fn replace_file(tmp_path: &Path, final_path: &Path) -> io::Result<()> {
    if let Err(error) = fs::rename(tmp_path, final_path) {
        let _ = fs::remove_file(tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("save.tmp");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
