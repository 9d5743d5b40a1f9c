//! Newline-delimited JSON session store.
//!
//! Implements the `SessionStore` trait from `pocketbot-core` with one log per
//! session at `{workspace}/sessions/{escaped-key}.jsonl`:
//!
//! ```text
//! {"_type":"metadata","key":"telegram:1","created_at":"...","updated_at":"...","last_consolidated":0,"metadata":{}}
//! {"role":"user","content":"hi","timestamp":"..."}
//! {"role":"assistant","content":"hello","timestamp":"..."}
//! ```
//!
//! On each save the whole log is written to a temporary file in the same
//! directory, synced, and renamed over the old log, so readers only ever see
//! a complete old or a complete new log.
//!
//! Logs from before the rename live in `~/.nanobot/sessions`. The first load
//! of a key with no current log moves its legacy log over.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use pocketbot_core::session::{Session, SessionStore};
use pocketbot_types::error::SessionStoreError;
use pocketbot_types::session::{
    METADATA_RECORD_TYPE, SessionInfo, SessionMessage, SessionMetadataRecord,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filename::{key_from_file_name, legacy_file_name, session_file_name};
use crate::filesystem::legacy_sessions_dir;

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct JsonlSessionStore {
    sessions_dir: PathBuf,
    legacy_dir: Option<PathBuf>,
}

impl JsonlSessionStore {
    /// Store rooted at `{workspace}/sessions`, migrating from the default
    /// legacy location.
    pub fn new(workspace: &Path) -> Self {
        Self {
            sessions_dir: workspace.join("sessions"),
            legacy_dir: legacy_sessions_dir(),
        }
    }

    /// Override (or with `None`, disable) the legacy lookup directory.
    pub fn with_legacy_dir(mut self, legacy_dir: Option<PathBuf>) -> Self {
        self.legacy_dir = legacy_dir;
        self
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    pub fn legacy_dir(&self) -> Option<&Path> {
        self.legacy_dir.as_deref()
    }

    /// Current log path for `key`.
    pub fn session_path(&self, key: &str) -> PathBuf {
        self.sessions_dir.join(session_file_name(key))
    }

    /// Move the legacy log for `key` into place. Returns `true` if the
    /// current log now exists.
    ///
    /// The legacy directory is searched under the current file name first,
    /// then under the name the pre-rename store gave it.
    async fn migrate_legacy(&self, key: &str, target: &Path) -> bool {
        let Some(legacy_dir) = &self.legacy_dir else {
            return false;
        };
        let Some(legacy_path) = find_legacy_log(legacy_dir, key).await else {
            return false;
        };

        let moved = async {
            tokio::fs::create_dir_all(&self.sessions_dir).await?;
            move_file(&legacy_path, target).await?;
            Ok::<_, std::io::Error>(())
        };
        match moved.await {
            Ok(()) => {
                info!(%key, from = %legacy_path.display(), "migrated legacy session log");
                true
            }
            Err(e) => {
                warn!(%key, from = %legacy_path.display(), error = %e, "failed to migrate legacy session log");
                false
            }
        }
    }

    fn io_error(key: &str, source: std::io::Error) -> SessionStoreError {
        SessionStoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl SessionStore for JsonlSessionStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, SessionStoreError> {
        let path = self.session_path(key);
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if !exists && !self.migrate_legacy(key, &path).await {
            return Ok(None);
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(%key, path = %path.display(), error = %e, "unreadable session log, starting fresh");
                return Ok(None);
            }
        };

        Ok(Some(parse_log(key, &content)))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let key = session.key();
        let content = render_log(session).map_err(|source| SessionStoreError::Encode {
            key: key.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.sessions_dir)
            .await
            .map_err(|e| Self::io_error(key, e))?;

        let target = self.session_path(key);
        let tmp = self
            .sessions_dir
            .join(format!(".{}.tmp", Uuid::now_v7().simple()));

        if let Err(e) = write_synced(&tmp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::io_error(key, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::io_error(key, e));
        }

        debug!(%key, path = %target.display(), messages = session.len(), "wrote session log");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        match tokio::fs::remove_file(self.session_path(key)).await {
            Ok(()) => {
                debug!(%key, "deleted session log");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn list(&self) -> Result<Vec<SessionInfo>, SessionStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.sessions_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionStoreError::Listing(e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(SessionStoreError::Listing)? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(key_from_name) = key_from_file_name(&file_name) else {
                continue;
            };
            let path = entry.path();
            let header = read_header(&path).await;

            let key = header
                .as_ref()
                .and_then(|h| h.key.clone())
                .unwrap_or(key_from_name);
            sessions.push(SessionInfo {
                key,
                created_at: header
                    .as_ref()
                    .and_then(|h| h.created_at.as_deref())
                    .and_then(parse_timestamp),
                updated_at: header
                    .as_ref()
                    .and_then(|h| h.updated_at.as_deref())
                    .and_then(parse_timestamp),
                path: path.display().to_string(),
            });
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

/// Replay a log. Lines that are not valid records are skipped.
fn parse_log(key: &str, content: &str) -> Session {
    let mut messages = Vec::new();
    let mut header: Option<SessionMetadataRecord> = None;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(%key, line = index + 1, error = %e, "skipping corrupt session record");
                continue;
            }
        };

        if SessionMetadataRecord::is_metadata(&value) {
            match serde_json::from_value(value) {
                Ok(record) => header = Some(record),
                Err(e) => warn!(%key, line = index + 1, error = %e, "skipping malformed metadata record"),
            }
            continue;
        }

        match serde_json::from_value::<SessionMessage>(value) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(%key, line = index + 1, error = %e, "skipping malformed message record"),
        }
    }

    let now = Utc::now();
    let header = header.unwrap_or_else(|| SessionMetadataRecord {
        record_type: METADATA_RECORD_TYPE.to_string(),
        key: None,
        created_at: None,
        updated_at: None,
        last_consolidated: 0,
        metadata: Default::default(),
    });
    let created_at = header
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let updated_at = header
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(created_at);

    Session::restore(
        key,
        messages,
        header.last_consolidated,
        created_at,
        updated_at,
        header.metadata,
    )
}

/// Serialize the metadata record plus every message, one per line.
fn render_log(session: &Session) -> Result<String, serde_json::Error> {
    let header = SessionMetadataRecord {
        record_type: METADATA_RECORD_TYPE.to_string(),
        key: Some(session.key().to_string()),
        created_at: Some(session.created_at().to_rfc3339()),
        updated_at: Some(session.updated_at().to_rfc3339()),
        last_consolidated: session.last_consolidated(),
        metadata: session.metadata.clone(),
    };

    let mut out = serde_json::to_string(&header)?;
    out.push('\n');
    for message in session.messages() {
        out.push_str(&serde_json::to_string(message)?);
        out.push('\n');
    }
    Ok(out)
}

/// Read just the metadata record at the top of a log.
async fn read_header(path: &Path) -> Option<SessionMetadataRecord> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut lines = BufReader::new(file).lines();
    let first = lines.next_line().await.ok()??;
    let value: Value = serde_json::from_str(&first).ok()?;
    if !SessionMetadataRecord::is_metadata(&value) {
        return None;
    }
    serde_json::from_value(value).ok()
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn find_legacy_log(legacy_dir: &Path, key: &str) -> Option<PathBuf> {
    for name in [session_file_name(key), legacy_file_name(key)] {
        let path = legacy_dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }
    }
    None
}

/// Rename, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    copy_then_remove(from, to, tokio::fs::remove_file(from)).await
}

/// Once the copy has landed the move is done: a source that cannot be
/// removed is only logged. A failed copy leaves no partial target behind.
async fn copy_then_remove(
    from: &Path,
    to: &Path,
    remove_source: impl Future<Output = std::io::Result<()>>,
) -> std::io::Result<()> {
    if let Err(e) = tokio::fs::copy(from, to).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    if let Err(e) = remove_source.await {
        warn!(from = %from.display(), to = %to.display(), error = %e, "copied legacy session log but could not remove the original");
    }
    Ok(())
}

/// Accept RFC 3339 as well as the offset-less ISO form older logs used
/// (read as UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> JsonlSessionStore {
        JsonlSessionStore::new(tmp.path()).with_legacy_dir(None)
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        assert!(store(&tmp).load("telegram:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_writes_metadata_first() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut session = Session::new("telegram:1");
        session.add_message("user", "hi");
        session.add_message("assistant", "hello");
        store.save(&session).await.unwrap();

        let path = tmp.path().join("sessions").join("telegram_1.jsonl");
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<Value> = raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["_type"], json!("metadata"));
        assert_eq!(lines[0]["key"], json!("telegram:1"));
        assert_eq!(lines[1]["content"], json!("hi"));
        assert_eq!(lines[2]["role"], json!("assistant"));
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let session = Session::new("web:x");
        store.save(&session).await.unwrap();
        store.save(&session).await.unwrap();

        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(store.sessions_dir()).await.unwrap();
        while let Some(entry) = dir.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["web_x.jsonl"]);
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        tokio::fs::create_dir_all(store.sessions_dir()).await.unwrap();
        tokio::fs::write(
            store.session_path("cli:1"),
            concat!(
                r#"{"_type":"metadata","created_at":"2024-01-01T00:00:00","updated_at":"2024-01-02T00:00:00","last_consolidated":1,"metadata":{}}"#,
                "\n",
                r#"{"role":"user","content":"first"}"#,
                "\n",
                "{not json\n",
                "\n",
                r#"{"content":"missing role"}"#,
                "\n",
                r#"{"role":"assistant","content":"second","timestamp":"2024-01-01T00:00:01"}"#,
                "\n",
            ),
        )
        .await
        .unwrap();

        let session = store.load("cli:1").await.unwrap().unwrap();
        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(session.last_consolidated(), 1);
        assert_eq!(
            session.created_at(),
            parse_timestamp("2024-01-01T00:00:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_log_without_metadata_still_loads() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        tokio::fs::create_dir_all(store.sessions_dir()).await.unwrap();
        tokio::fs::write(store.session_path("cli:2"), "{\"role\":\"user\",\"content\":\"x\"}\n")
            .await
            .unwrap();

        let session = store.load("cli:2").await.unwrap().unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(session.last_consolidated(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save(&Session::new("web:gone")).await.unwrap();

        assert!(store.delete("web:gone").await.unwrap());
        assert!(!store.delete("web:gone").await.unwrap());
        assert!(store.load("web:gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(store(&tmp).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_by_updated_desc_and_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        tokio::fs::create_dir_all(store.sessions_dir()).await.unwrap();

        let old = Session::restore(
            "web:old",
            Vec::new(),
            0,
            parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
            Default::default(),
        );
        store.save(&old).await.unwrap();
        store.save(&Session::new("web:new")).await.unwrap();
        tokio::fs::write(store.sessions_dir().join("notes.txt"), "x").await.unwrap();

        let listed = store.list().await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["web:new", "web:old"]);
        assert!(listed[0].path.ends_with("web_new.jsonl"));
    }

    #[tokio::test]
    async fn test_list_falls_back_to_file_name_key() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        tokio::fs::create_dir_all(store.sessions_dir()).await.unwrap();
        tokio::fs::write(
            store.sessions_dir().join("discord_42.jsonl"),
            "{\"_type\":\"metadata\",\"last_consolidated\":0}\n",
        )
        .await
        .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "discord:42");
        assert!(listed[0].updated_at.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_log_is_treated_as_absent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        // A directory where the log should be cannot be read as a file
        tokio::fs::create_dir_all(store.session_path("web:dir")).await.unwrap();

        assert!(store.load("web:dir").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("sessions");
        tokio::fs::write(&blocker, "not a directory").await.unwrap();

        let result = store(&tmp).save(&Session::new("web:x")).await;
        assert!(matches!(result, Err(SessionStoreError::Io { .. })));
    }

    #[tokio::test]
    async fn test_legacy_log_is_moved_on_first_load() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("legacy");
        tokio::fs::create_dir_all(&legacy).await.unwrap();
        tokio::fs::write(
            legacy.join("telegram_7.jsonl"),
            "{\"role\":\"user\",\"content\":\"from the old days\"}\n",
        )
        .await
        .unwrap();

        let workspace = tmp.path().join("workspace");
        let store = JsonlSessionStore::new(&workspace).with_legacy_dir(Some(legacy.clone()));
        let session = store.load("telegram:7").await.unwrap().unwrap();

        assert_eq!(session.messages()[0].content, "from the old days");
        assert!(store.session_path("telegram:7").exists());
        assert!(!legacy.join("telegram_7.jsonl").exists());
    }

    #[tokio::test]
    async fn test_current_log_shadows_legacy() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("legacy");
        tokio::fs::create_dir_all(&legacy).await.unwrap();
        tokio::fs::write(legacy.join("web_1.jsonl"), "{\"role\":\"user\",\"content\":\"old\"}\n")
            .await
            .unwrap();

        let store = JsonlSessionStore::new(&tmp.path().join("ws")).with_legacy_dir(Some(legacy.clone()));
        let mut current = Session::new("web:1");
        current.add_message("user", "new");
        store.save(&current).await.unwrap();

        let loaded = store.load("web:1").await.unwrap().unwrap();
        assert_eq!(loaded.messages()[0].content, "new");
        assert!(legacy.join("web_1.jsonl").exists());
    }

    #[tokio::test]
    async fn test_legacy_log_under_original_name_is_found() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("legacy");
        tokio::fs::create_dir_all(&legacy).await.unwrap();
        for (file, content) in [
            ("telegram_123_456.jsonl", "numbered"),
            ("email_a@b.com.jsonl", "mailed"),
        ] {
            let line = json!({"role": "user", "content": content}).to_string();
            tokio::fs::write(legacy.join(file), format!("{line}\n")).await.unwrap();
        }

        let store = JsonlSessionStore::new(&tmp.path().join("ws")).with_legacy_dir(Some(legacy.clone()));
        let numbered = store.load("telegram:123_456").await.unwrap().unwrap();
        let mailed = store.load("email:a@b.com").await.unwrap().unwrap();

        assert_eq!(numbered.messages()[0].content, "numbered");
        assert_eq!(mailed.messages()[0].content, "mailed");
        assert!(store.session_path("telegram:123_456").exists());
        assert!(store.session_path("email:a@b.com").exists());
        assert!(!legacy.join("telegram_123_456.jsonl").exists());
    }

    #[tokio::test]
    async fn test_copy_counts_as_moved_when_source_cannot_be_removed() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("old.jsonl");
        let to = tmp.path().join("new.jsonl");
        tokio::fs::write(&from, "{\"role\":\"user\",\"content\":\"kept\"}\n").await.unwrap();

        let read_only = async {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        };
        copy_then_remove(&from, &to, read_only).await.unwrap();

        assert!(from.exists());
        let copied = tokio::fs::read_to_string(&to).await.unwrap();
        assert!(copied.contains("kept"));
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_no_target() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("missing.jsonl");
        let to = tmp.path().join("new.jsonl");

        let result = copy_then_remove(&from, &to, async { Ok::<(), std::io::Error>(()) }).await;
        assert!(result.is_err());
        assert!(!to.exists());
    }

    #[tokio::test]
    async fn test_multimodal_message_survives_load_and_save() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        tokio::fs::create_dir_all(store.sessions_dir()).await.unwrap();
        let multimodal = json!({
            "role": "user",
            "content": [{"type": "text", "text": "what is this"}, {"type": "image_url", "image_url": {"url": "data:image/png;base64,AA"}}],
            "timestamp": "2024-01-01T00:00:00"
        });
        let plain = json!({"role": "assistant", "content": "a cat", "timestamp": "2024-01-01T00:00:01"});
        tokio::fs::write(
            store.session_path("web:multi"),
            format!("{multimodal}\n{plain}\n"),
        )
        .await
        .unwrap();

        let session = store.load("web:multi").await.unwrap().unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.messages()[0].content, "what is this");

        store.save(&session).await.unwrap();
        let reloaded = store.load("web:multi").await.unwrap().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get_history(None), session.get_history(None));

        let raw = tokio::fs::read_to_string(store.session_path("web:multi")).await.unwrap();
        let line: Value = serde_json::from_str(raw.lines().nth(1).unwrap()).unwrap();
        assert_eq!(line, multimodal);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let with_offset = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        let naive = parse_timestamp("2024-05-01T10:00:00.123456").unwrap();
        assert_eq!(with_offset.timestamp(), naive.timestamp());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
