//! CSV-on-disk adapters for the ledger and registration ports.
//!
//! Files are opened through `cap_std` directory handles rooted at the file's
//! parent. Reads and appends run on the blocking pool; parsing happens back on
//! the caller's task.

mod ledger;
mod registrations;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cap_std::ambient_authority;
use cap_std::fs::{Dir, OpenOptions};

pub use ledger::CsvLedger;
pub use registrations::{CsvRegistrationSource, read_user_ids};

const BYTE_ORDER_MARK: char = '\u{feff}';

fn split_path(path: &Path) -> io::Result<(PathBuf, PathBuf)> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} does not name a file", path.display()),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((parent.to_path_buf(), PathBuf::from(file_name)))
}

/// Read a UTF-8 file. A missing file or parent directory reads as `None`.
fn read_text(path: &Path) -> io::Result<Option<String>> {
    let (parent, file_name) = split_path(path)?;
    let dir = match Dir::open_ambient_dir(&parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error),
    };
    match dir.read_to_string(&file_name) {
        Ok(text) => Ok(Some(match text.strip_prefix(BYTE_ORDER_MARK) {
            Some(rest) => rest.to_owned(),
            None => text,
        })),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

/// Append `row` to a file, writing `header` first when the file is new or
/// empty and terminating an unterminated last line.
fn append_text(path: &Path, header: &str, row: &str) -> io::Result<()> {
    let (parent, file_name) = split_path(path)?;
    Dir::create_ambient_dir_all(&parent, ambient_authority())?;
    let dir = Dir::open_ambient_dir(&parent, ambient_authority())?;

    let lead = match dir.read_to_string(&file_name) {
        Ok(existing) if existing.trim().is_empty() => header.to_owned(),
        Ok(existing) if !existing.ends_with('\n') => "\n".to_owned(),
        Ok(_) => String::new(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => header.to_owned(),
        Err(error) => return Err(error),
    };

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    let mut file = dir.open_with(&file_name, &options)?;
    file.write_all(format!("{lead}{row}").as_bytes())?;
    file.flush()
}

async fn run_blocking<T, F>(task: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(io::Error::other)?
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|inner| inner.trim().to_owned())
        .filter(|inner| !inner.is_empty())
}
