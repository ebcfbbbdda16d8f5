//! File classification: stream-able video becomes a pointer file, everything
//! else is downloaded.

/// Extensions (lowercase, without dot) written as `.strm` pointer files.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv"];

/// Extension of pointer files.
pub const POINTER_EXTENSION: &str = "strm";

/// How a listed file is materialized locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind<'a> {
    /// Write a pointer file named `<base_name>.strm`.
    Pointer {
        /// File name with its video extension removed.
        base_name: &'a str,
    },
    /// Copy the file's bytes.
    Download,
}

/// Classifies `file_name` by its extension, ignoring case.
#[must_use]
pub fn classify(file_name: &str) -> FileKind<'_> {
    match file_name.rsplit_once('.') {
        Some((base_name, extension))
            if VIDEO_EXTENSIONS
                .iter()
                .any(|video| extension.eq_ignore_ascii_case(video)) =>
        {
            FileKind::Pointer { base_name }
        }
        _ => FileKind::Download,
    }
}
