/// Year/month bucketing for the archive.
///
/// Every cleanup pass lands in `root/YYYY/MM`, computed from the moment the
/// pass starts.
use chrono::{DateTime, Datelike, TimeZone};
use std::path::{Path, PathBuf};

pub struct ArchivePathBuilder;

impl ArchivePathBuilder {
    /// Returns `root/YYYY/MM` for the calendar date of `now`.
    ///
    /// Creating the directory is left to the caller.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Local, TimeZone};
    /// use deskbroom::archive_path::ArchivePathBuilder;
    /// use std::path::Path;
    ///
    /// let now = Local.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
    /// let dir = ArchivePathBuilder::build_destination_dir(Path::new("/archive"), &now);
    /// assert_eq!(dir, Path::new("/archive/2024/03"));
    /// ```
    pub fn build_destination_dir<Tz: TimeZone>(root: &Path, now: &DateTime<Tz>) -> PathBuf {
        root.join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()))
    }
}
