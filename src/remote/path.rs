//! Remote path normalization and download URL construction.
//!
//! Remote paths are slash-separated, start with `/`, and never end with `/`
//! except for the root itself. Two paths name the same directory only if
//! their normalized strings are equal.

/// Normalizes a decoded remote path.
///
/// Empty input becomes `/`, a leading `/` is added when missing, and repeated
/// or trailing slashes are collapsed.
#[must_use]
pub fn normalize_remote_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Joins a child entry name onto a normalized directory path.
#[must_use]
pub fn join_remote_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Builds the content URL `{host}/d{dir_path}/{file_name}`.
///
/// Names are kept verbatim; this is the text written into pointer files and
/// the failure queue. Use [`encode_download_url`] before requesting it.
#[must_use]
pub fn download_url(host: &str, dir_path: &str, file_name: &str) -> String {
    let host = host.trim_end_matches('/');
    if dir_path == "/" {
        format!("{host}/d/{file_name}")
    } else {
        format!("{host}/d{dir_path}/{file_name}")
    }
}

/// Percent-encodes each path segment of a raw URL below `host`.
///
/// Spaces, `#` and `?` in names would otherwise be read as delimiters.
/// URLs that do not start with `host` are returned unchanged.
#[must_use]
pub fn encode_download_url(host: &str, raw_url: &str) -> String {
    let host = host.trim_end_matches('/');
    let Some(path) = raw_url.strip_prefix(host).filter(|p| p.starts_with('/')) else {
        return raw_url.to_string();
    };
    let mut url = host.to_string();
    for segment in path.split('/').skip(1) {
        url.push('/');
        url.push_str(&urlencoding::encode(segment));
    }
    url
}
