// Script Store Port
// Persistent list of named script blobs

use crate::domain::ScriptName;
use crate::error::Result;
use async_trait::async_trait;

/// Script store interface
///
/// Callers pass already sanitized names; implementations never see raw
/// client input. Writes must be atomic: a failed write leaves no partial
/// script visible.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// List stored script names (sorted)
    async fn list(&self) -> Result<Vec<ScriptName>>;

    /// Create or replace a script
    async fn write(&self, name: &ScriptName, content: &str) -> Result<()>;

    /// Read a script's content
    ///
    /// # Errors
    /// - AppError::NotFound if the script does not exist
    async fn read(&self, name: &ScriptName) -> Result<String>;

    /// Check whether a script exists
    async fn contains(&self, name: &ScriptName) -> Result<bool>;

    /// Delete a script; returns false when it did not exist
    async fn delete(&self, name: &ScriptName) -> Result<bool>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory script store
    #[derive(Default)]
    pub struct InMemoryScriptStore {
        scripts: Mutex<BTreeMap<ScriptName, String>>,
    }

    impl InMemoryScriptStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a script (test setup)
        pub fn with_script(self, name: &str, content: &str) -> Self {
            if let Some(name) = ScriptName::sanitize(name) {
                self.scripts
                    .lock()
                    .unwrap()
                    .insert(name, content.to_string());
            }
            self
        }
    }

    #[async_trait]
    impl ScriptStore for InMemoryScriptStore {
        async fn list(&self) -> Result<Vec<ScriptName>> {
            Ok(self.scripts.lock().unwrap().keys().cloned().collect())
        }

        async fn write(&self, name: &ScriptName, content: &str) -> Result<()> {
            self.scripts
                .lock()
                .unwrap()
                .insert(name.clone(), content.to_string());
            Ok(())
        }

        async fn read(&self, name: &ScriptName) -> Result<String> {
            self.scripts
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Script {} not found", name)))
        }

        async fn contains(&self, name: &ScriptName) -> Result<bool> {
            Ok(self.scripts.lock().unwrap().contains_key(name))
        }

        async fn delete(&self, name: &ScriptName) -> Result<bool> {
            Ok(self.scripts.lock().unwrap().remove(name).is_some())
        }
    }
}
