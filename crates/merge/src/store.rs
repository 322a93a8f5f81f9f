use crate::change::ChangeAction;
use crate::error::{MergeError, Result};
use crate::queue::PendingChange;
use std::io;
use std::path::Path;

/// Storage the caller persists accepted changes into
pub trait FileStore {
    /// Read a whole file; `ErrorKind::NotFound` when it does not exist
    fn read_file(&self, path: &Path) -> io::Result<String>;

    fn write_file(&self, path: &Path, text: &str) -> io::Result<()>;
}

/// Text of a file after integrating `change`.
///
/// `replace` (and an acknowledged `conflict`) swaps the first occurrence
/// of the old code; when it is not present the new code is appended.
/// `delete` removes the old code. `add` appends.
#[must_use]
pub fn integrate(existing: &str, change: &PendingChange) -> String {
    match change.action {
        ChangeAction::Add => append_block(existing, &change.new_code),
        ChangeAction::Replace | ChangeAction::Conflict => {
            if !change.old_code.is_empty() && existing.contains(&change.old_code) {
                existing.replacen(&change.old_code, &change.new_code, 1)
            } else {
                append_block(existing, &change.new_code)
            }
        }
        ChangeAction::Delete => {
            if change.old_code.is_empty() {
                existing.to_string()
            } else {
                existing.replacen(&change.old_code, "", 1)
            }
        }
    }
}

fn append_block(existing: &str, block: &str) -> String {
    let mut out = existing.trim_end_matches('\n').to_string();
    if !out.is_empty() {
        out.push_str("\n\n\n");
    }
    out.push_str(block.trim_end_matches('\n'));
    out.push('\n');
    out
}

/// Persist one pending change through `store`
pub fn write_change(store: &dyn FileStore, change: &PendingChange) -> Result<()> {
    let path = Path::new(&change.file_path);
    let existing = match store.read_file(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(MergeError::store(&change.file_path, e)),
    };

    let updated = integrate(&existing, change);
    store
        .write_file(path, &updated)
        .map_err(|e| MergeError::store(&change.file_path, e))?;
    log::debug!("Wrote {} {} to {}", change.action, change.entity_name, change.file_path);
    Ok(())
}
