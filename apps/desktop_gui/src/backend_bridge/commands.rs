//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

pub enum BackendCommand {
    /// Read, validate, and preview the file at `path`.
    SelectFile { path: PathBuf },
    /// Send the selected input to the removal service.
    Process,
    /// Save the current result through a save dialog. No-op without a result.
    Download,
    /// Clear the whole session.
    Reset,
}
