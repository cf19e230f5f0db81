use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Key prefix for provider output copied into durable storage.
pub const GENERATED_PREFIX: &str = "generated";
/// Key prefix for uploaded child photos.
pub const CHILD_PHOTO_PREFIX: &str = "child-photos";

/// `{prefix}/{unix_millis}-{random}.{extension}`
pub fn generate_storage_path(prefix: &str, extension: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!(
        "{prefix}/{}-{suffix}.{}",
        Utc::now().timestamp_millis(),
        extension.trim_start_matches('.')
    )
}

/// Export artifacts are keyed `{story_id}/{unix_millis}.pdf`.
pub fn export_path(story_id: Uuid, timestamp_millis: i64) -> String {
    format!("{story_id}/{timestamp_millis}.pdf")
}

/// File extension from an uploaded file name, defaulting to `jpg`.
pub fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string())
}
