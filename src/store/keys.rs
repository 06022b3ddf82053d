//! Object path helpers used by callers of the pipeline.
//!
//! The pipeline uploads to exactly the path it is given. These helpers
//! implement the two naming policies of the admin screens: folder uploads
//! keep the original filename, gallery uploads prefix a millisecond
//! timestamp to avoid collisions.

use chrono::Utc;

/// `folder/name`, or just `name` when there is no folder.
pub fn join_key(folder: Option<&str>, name: &str) -> String {
    match folder.map(|f| f.trim_matches('/')).filter(|f| !f.is_empty()) {
        Some(folder) => format!("{}/{}", folder, name),
        None => name.to_string(),
    }
}

/// `folder/<unix-millis>-name` using the current time.
pub fn timestamped_key(folder: Option<&str>, name: &str) -> String {
    timestamped_key_at(folder, name, Utc::now().timestamp_millis())
}

/// `folder/<millis>-name` for a fixed timestamp.
pub fn timestamped_key_at(folder: Option<&str>, name: &str, millis: i64) -> String {
    join_key(folder, &format!("{}-{}", millis, name))
}
