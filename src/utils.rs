//! Utility functions for file naming

/// Maximum number of rename attempts when resolving file collisions
pub(crate) const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Make an upload name safe to use as a single file name
///
/// Path separators, control characters and characters rejected by common
/// filesystems are replaced with `_`. Leading dots are stripped so a record
/// cannot produce a hidden file or `..`. An empty result becomes `untitled`.
///
/// # Examples
///
/// ```
/// use records_ingest::utils::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("2024/05 Minutes.txt"), "2024_05 Minutes.txt");
/// assert_eq!(sanitize_file_name("../etc"), "_etc");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name for the `attempt`-th collision of `name`
///
/// Attempt 0 is the name itself; later attempts insert ` (n)` before the
/// extension, e.g. `minutes (2).txt`.
pub fn numbered_file_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, attempt, ext),
        _ => format!("{} ({})", name, attempt),
    }
}
