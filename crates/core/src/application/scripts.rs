// Script Service - validated access to the script store

use crate::domain::{DomainError, ScriptName};
use crate::error::{AppError, Result};
use crate::port::ScriptStore;
use std::sync::Arc;
use tracing::info;

/// Script management use cases
///
/// Raw client names are sanitized here; the store only sees safe names.
pub struct ScriptService {
    store: Arc<dyn ScriptStore>,
}

impl ScriptService {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self { store }
    }

    fn sanitize(filename: &str) -> Result<ScriptName> {
        ScriptName::sanitize(filename)
            .ok_or_else(|| DomainError::InvalidScriptName(filename.to_string()).into())
    }

    pub async fn list(&self) -> Result<Vec<ScriptName>> {
        self.store.list().await
    }

    /// Store a script under its sanitized name
    ///
    /// # Errors
    /// - AppError::Validation if filename or content is empty
    /// - AppError::Domain if the filename cannot be sanitized
    pub async fn upload(&self, filename: &str, content: &str) -> Result<ScriptName> {
        if filename.trim().is_empty() || content.is_empty() {
            return Err(AppError::Validation(
                "filename & content required".to_string(),
            ));
        }

        let name = Self::sanitize(filename)?;
        self.store.write(&name, content).await?;

        info!(script = %name, bytes = content.len(), "Script stored");
        Ok(name)
    }

    pub async fn get(&self, filename: &str) -> Result<(ScriptName, String)> {
        let name = Self::sanitize(filename)?;
        let content = self.store.read(&name).await?;
        Ok((name, content))
    }

    /// # Errors
    /// - AppError::NotFound if no such script is stored
    pub async fn delete(&self, filename: &str) -> Result<ScriptName> {
        let name = Self::sanitize(filename)?;
        if !self.store.delete(&name).await? {
            return Err(AppError::NotFound(format!("Script {} not found", name)));
        }

        info!(script = %name, "Script deleted");
        Ok(name)
    }
}
