use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};

/// Filesystem-safe, second-resolution timestamp, e.g. "20260218_093000".
pub fn fmt_ts<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Path of the snapshot saved for a detection at `at`.
/// e.g. "frames/frame_20260218_093000.jpg"
pub fn snapshot_path<Tz: TimeZone>(output_dir: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    output_dir.join(format!("frame_{}.jpg", fmt_ts(at)))
}
