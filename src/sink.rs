//! Where artifacts are written. Each write is atomic per artifact.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Write one artifact at `path` (relative, `/`-separated), replacing any existing file.
    async fn write(&self, path: &str, content: &[u8]) -> io::Result<()>;
}

/// Writes under a root directory: temp file next to the target, then rename.
#[derive(Clone, Debug)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSink { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, path: &str) -> io::Result<PathBuf> {
        let rel = Path::new(path);
        let plain = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact path '{}' must be relative and stay inside the output root", path),
            ));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ArtifactSink for FsSink {
    async fn write(&self, path: &str, content: &[u8]) -> io::Result<()> {
        let target = self.target(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = target.clone().into_os_string();
        tmp.push(".appgen-tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

/// In-memory sink; can be told to fail on one path.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_on: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(path: impl Into<String>) -> Self {
        MemorySink {
            files: Mutex::new(BTreeMap::new()),
            fail_on: Some(path.into()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().ok()?.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, path: &str, content: &[u8]) -> io::Result<()> {
        if self.fail_on.as_deref() == Some(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, format!("refusing to write {}", path)));
        }
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        files.insert(path.to_string(), content.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_sink_creates_directories_and_replaces_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        sink.write("shop/models/order.py", b"v1").await.unwrap();
        sink.write("shop/models/order.py", b"v2").await.unwrap();
        let written = std::fs::read(dir.path().join("shop/models/order.py")).unwrap();
        assert_eq!(written, b"v2");
        assert!(!dir.path().join("shop/models/order.py.appgen-tmp").exists());
    }

    #[tokio::test]
    async fn fs_sink_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsSink::new(dir.path());
        let err = sink.write("../outside.py", b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(sink.write("/etc/passwd", b"x").await.is_err());
    }

    #[tokio::test]
    async fn memory_sink_fails_on_request() {
        let sink = MemorySink::failing_on("b.py");
        sink.write("a.py", b"a").await.unwrap();
        assert!(sink.write("b.py", b"b").await.is_err());
        assert_eq!(sink.paths(), vec!["a.py".to_string()]);
    }
}
