use chrono::NaiveDate;

/// `{YYYYMMDD}-{id}.{ext}`
pub fn artifact_filename(date: NaiveDate, id: u64, ext: &str) -> String {
    format!("{}-{id}.{ext}", date.format("%Y%m%d"))
}

/// Inverse of [`artifact_filename`]: `(date, id)` when `name` has exactly
/// that shape with the given extension.
pub fn parse_artifact_filename(name: &str, ext: &str) -> Option<(NaiveDate, u64)> {
    let stem = name.strip_suffix(ext)?.strip_suffix('.')?;
    let (date, id) = stem.split_once('-')?;
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    Some((date, id.parse().ok()?))
}

pub fn quarantine_filename(id: u64) -> String {
    format!("EMPTY-{id}.txt")
}
