// Filesystem script store
// One file per script, written via a named temp file persisted over the destination

use async_trait::async_trait;
use bashpanel_core::domain::script::SCRIPT_EXTENSION;
use bashpanel_core::domain::ScriptName;
use bashpanel_core::error::{AppError, Result};
use bashpanel_core::port::ScriptStore;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Permission bits for stored scripts (rwxr-xr-x)
#[cfg(unix)]
const SCRIPT_MODE: u32 = 0o755;

/// Script store rooted at one directory
pub struct FsScriptStore {
    dir: PathBuf,
}

impl FsScriptStore {
    /// Open the store, creating its directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Store(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &ScriptName) -> PathBuf {
        self.dir.join(name.as_str())
    }
}

/// Write `content` to a temp file in `dir`, then rename it over `dest`
///
/// The temp file is deleted on drop if any step fails.
fn write_via_temp(dir: &Path, dest: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(SCRIPT_MODE))?;
    }

    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ScriptStore for FsScriptStore {
    async fn list(&self) -> Result<Vec<ScriptName>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AppError::Store(format!("failed to list scripts: {}", e)))?;

        let mut scripts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Store(format!("failed to list scripts: {}", e)))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.ends_with(SCRIPT_EXTENSION) {
                continue;
            }
            // temp files and foreign names never sanitize to themselves
            match ScriptName::sanitize(file_name) {
                Some(name) if name.as_str() == file_name => scripts.push(name),
                _ => debug!(file = %file_name, "Skipping non-script file"),
            }
        }

        scripts.sort();
        Ok(scripts)
    }

    async fn write(&self, name: &ScriptName, content: &str) -> Result<()> {
        let dest = self.path_of(name);
        let dir = self.dir.clone();
        let target = dest.clone();
        let bytes = content.as_bytes().to_vec();

        let written = tokio::task::spawn_blocking(move || write_via_temp(&dir, &target, &bytes))
            .await
            .map_err(|e| AppError::Internal(format!("script write task failed: {}", e)))?;

        if let Err(e) = written {
            warn!(script = %name, error = %e, "Script write failed");
            return Err(AppError::Store(format!(
                "failed to write script {}: {}",
                name, e
            )));
        }

        debug!(script = %name, path = %dest.display(), "Script written");
        Ok(())
    }

    async fn read(&self, name: &ScriptName) -> Result<String> {
        match tokio::fs::read_to_string(self.path_of(name)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Script {} not found", name)))
            }
            Err(e) => Err(AppError::Store(format!(
                "failed to read script {}: {}",
                name, e
            ))),
        }
    }

    async fn contains(&self, name: &ScriptName) -> Result<bool> {
        match tokio::fs::metadata(self.path_of(name)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Store(format!(
                "failed to stat script {}: {}",
                name, e
            ))),
        }
    }

    async fn delete(&self, name: &ScriptName) -> Result<bool> {
        match tokio::fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Store(format!(
                "failed to delete script {}: {}",
                name, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> ScriptName {
        ScriptName::sanitize(raw).unwrap()
    }

    #[tokio::test]
    async fn test_write_list_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();

        store.write(&name("b"), "echo b").await.unwrap();
        store.write(&name("a"), "echo a").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![name("a"), name("b")]);
        assert_eq!(store.read(&name("a")).await.unwrap(), "echo a");
        assert!(store.contains(&name("b")).await.unwrap());

        assert!(store.delete(&name("a")).await.unwrap());
        assert!(!store.delete(&name("a")).await.unwrap());
        assert!(!store.contains(&name("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();

        store.write(&name("x"), "v1").await.unwrap();
        store.write(&name("x"), "v2").await.unwrap();

        assert_eq!(store.read(&name("x")).await.unwrap(), "v2");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_traversal_name_stays_inside_store() {
        let root = tempfile::tempdir().unwrap();
        let store_dir = root.path().join("scripts");
        let store = FsScriptStore::open(&store_dir).await.unwrap();

        store
            .write(&name("../../etc/passwd"), "echo pwned")
            .await
            .unwrap();

        assert!(store_dir.join("passwd.sh").is_file());
        let outside: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(outside, vec![std::ffi::OsString::from("scripts")]);
    }

    #[tokio::test]
    async fn test_list_ignores_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join(".tmpAb12Cd"), "x").unwrap();
        std::fs::write(dir.path().join(".stale.sh"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("has space.sh"), "x").unwrap();
        store.write(&name("real"), "echo").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![name("real")]);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.read(&name("nope")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dot_prefixed_upload_is_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();

        let hidden = name(".hidden");
        store.write(&hidden, "echo").await.unwrap();

        assert_eq!(hidden.as_str(), "hidden.sh");
        assert!(store.contains(&hidden).await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec![hidden]);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();

        store.write(&name("a"), "echo a").await.unwrap();
        store.write(&name("a"), "echo again").await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("a.sh")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_is_store_error_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();
        // a directory squatting on the destination makes the rename fail
        std::fs::create_dir(dir.path().join("taken.sh")).unwrap();
        std::fs::write(dir.path().join("taken.sh").join("keep"), "x").unwrap();

        let result = store.write(&name("taken"), "echo").await;
        assert!(matches!(result, Err(AppError::Store(_))));

        let mut files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        files.sort();
        assert_eq!(files, vec![std::ffi::OsString::from("taken.sh")]);
        assert!(dir.path().join("taken.sh").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FsScriptStore::open(dir.path()).await.unwrap();
        store.write(&name("run"), "echo").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
