//! Persona/user-profile/memory text artifacts (§4.6).
//!
//! The identity root is process-global: every session reads the same
//! persona and user profile, and appends to the same memory log. Writers
//! are serialized per artifact with an async mutex so overwrite/append
//! calls from concurrent sessions don't interleave mid-write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use va_domain::error::{Error, Result};
use va_domain::trace::TraceEvent;
use va_domain::ProfileStore;

/// The three plain-text artifacts the identity store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityArtifact {
    /// Immutable during a session; read once at startup.
    Persona,
    /// Read at startup, rewritable via the `update_user_profile` tool.
    UserProfile,
    /// Append-only log of turn summaries.
    Memory,
}

impl IdentityArtifact {
    fn file_name(self) -> &'static str {
        match self {
            IdentityArtifact::Persona => "persona.txt",
            IdentityArtifact::UserProfile => "user_profile.txt",
            IdentityArtifact::Memory => "memory.txt",
        }
    }

    fn label(self) -> &'static str {
        match self {
            IdentityArtifact::Persona => "persona",
            IdentityArtifact::UserProfile => "user_profile",
            IdentityArtifact::Memory => "memory",
        }
    }
}

/// Filesystem-backed store for the three identity artifacts.
pub struct IdentityStore {
    root: PathBuf,
    persona_lock: Arc<Mutex<()>>,
    profile_lock: Arc<Mutex<()>>,
    memory_lock: Arc<Mutex<()>>,
}

impl IdentityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            persona_lock: Arc::new(Mutex::new(())),
            profile_lock: Arc::new(Mutex::new(())),
            memory_lock: Arc::new(Mutex::new(())),
        }
    }

    fn path_for(&self, artifact: IdentityArtifact) -> PathBuf {
        self.root.join(artifact.file_name())
    }

    fn lock_for(&self, artifact: IdentityArtifact) -> Arc<Mutex<()>> {
        match artifact {
            IdentityArtifact::Persona => self.persona_lock.clone(),
            IdentityArtifact::UserProfile => self.profile_lock.clone(),
            IdentityArtifact::Memory => self.memory_lock.clone(),
        }
    }

    /// Read an artifact's full text. A missing file reads as empty, so a
    /// freshly bootstrapped identity root needs no pre-seeded files.
    pub async fn read(&self, artifact: IdentityArtifact) -> Result<String> {
        let path = self.path_for(artifact);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Overwrite an artifact's full content: write to a uniquely named temp
    /// sibling, fsync, then rename into place so readers never observe a
    /// partial write.
    pub async fn overwrite(&self, artifact: IdentityArtifact, content: &str) -> Result<()> {
        let path = self.path_for(artifact);
        ensure_parent(&path).await?;

        let lock = self.lock_for(artifact);
        let _guard = lock.lock().await;

        let tmp_name = format!(
            ".{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            uuid::Uuid::new_v4().as_simple()
        );
        let tmp_path = path.with_file_name(tmp_name);

        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await.map_err(Error::Io)?;
            file.write_all(content.as_bytes()).await.map_err(Error::Io)?;
            file.flush().await.map_err(Error::Io)?;
            file.sync_all().await.map_err(Error::Io)?;
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Error::Io(e));
        }

        TraceEvent::IdentityWritten {
            artifact: artifact.label(),
            bytes: content.len(),
        }
        .emit();

        Ok(())
    }

    /// Append one line to the memory log (append-open, then fsync).
    pub async fn append_memory(&self, line: &str) -> Result<()> {
        let path = self.path_for(IdentityArtifact::Memory);
        ensure_parent(&path).await?;

        let lock = self.lock_for(IdentityArtifact::Memory);
        let _guard = lock.lock().await;

        let mut buf = line.to_string();
        if !buf.ends_with('\n') {
            buf.push('\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).await.map_err(Error::Io)?;
        file.flush().await.map_err(Error::Io)?;
        file.sync_all().await.map_err(Error::Io)?;

        TraceEvent::IdentityWritten {
            artifact: IdentityArtifact::Memory.label(),
            bytes: buf.len(),
        }
        .emit();

        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(Error::Io)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ProfileStore for IdentityStore {
    async fn write_profile(&self, content: &str) -> Result<()> {
        self.overwrite(IdentityArtifact::UserProfile, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_artifact_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        assert_eq!(store.read(IdentityArtifact::Persona).await.unwrap(), "");
    }

    #[tokio::test]
    async fn overwrite_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        store
            .overwrite(IdentityArtifact::UserProfile, "likes tea")
            .await
            .unwrap();
        assert_eq!(
            store.read(IdentityArtifact::UserProfile).await.unwrap(),
            "likes tea"
        );

        // No stray temp file left behind.
        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["user_profile.txt"]);
    }

    #[tokio::test]
    async fn overwrite_replaces_prior_content() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        store
            .overwrite(IdentityArtifact::UserProfile, "first")
            .await
            .unwrap();
        store
            .overwrite(IdentityArtifact::UserProfile, "second")
            .await
            .unwrap();
        assert_eq!(
            store.read(IdentityArtifact::UserProfile).await.unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn append_memory_accumulates_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(tmp.path());
        store.append_memory("turn 1 summary").await.unwrap();
        store.append_memory("turn 2 summary").await.unwrap();

        let content = store.read(IdentityArtifact::Memory).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["turn 1 summary", "turn 2 summary"]);
    }

    #[tokio::test]
    async fn write_profile_implements_profile_store_trait() {
        let tmp = tempfile::tempdir().unwrap();
        let store: std::sync::Arc<dyn ProfileStore> = std::sync::Arc::new(IdentityStore::new(tmp.path()));
        store.write_profile("trait call").await.unwrap();

        let direct = IdentityStore::new(tmp.path());
        assert_eq!(
            direct.read(IdentityArtifact::UserProfile).await.unwrap(),
            "trait call"
        );
    }
}
