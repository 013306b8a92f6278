use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem layout of a running service. Relative paths from the
/// configuration are resolved against `project_root`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
    pub vector_cache_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::with_root(discover_project_root())
    }

    pub fn with_root(project_root: PathBuf) -> Self {
        let config_path = env::var("AGENTIC_RAG_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join("config.yml"));
        let secrets_path = config_path
            .parent()
            .map(|dir| dir.join("secrets.yml"))
            .unwrap_or_else(|| project_root.join("secrets.yml"));
        let vector_cache_dir = project_root.join(".vector_cache");

        AppPaths {
            project_root,
            config_path,
            secrets_path,
            vector_cache_dir,
        }
    }

    /// Resolves a configured path; absolute paths are kept as-is.
    pub fn resolve(&self, configured: impl AsRef<Path>) -> PathBuf {
        let configured = configured.as_ref();
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.project_root.join(configured)
        }
    }

    /// Resolves a file path and creates its parent directory.
    pub fn ensure_parent(&self, configured: impl AsRef<Path>) -> PathBuf {
        let path = self.resolve(configured);
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        path
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("AGENTIC_RAG_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_absolute_and_joins_relative() {
        let root = std::env::temp_dir().join("agentic-rag-paths");
        let paths = AppPaths::with_root(root.clone());

        assert_eq!(paths.resolve("db/crm.db"), root.join("db/crm.db"));
        let absolute = std::env::temp_dir().join("elsewhere.db");
        assert_eq!(paths.resolve(&absolute), absolute);
    }

    #[test]
    fn ensure_parent_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_root(dir.path().to_path_buf());

        let db = paths.ensure_parent("nested/deeper/crm.db");
        assert!(db.parent().unwrap().is_dir());
        assert!(!db.exists());
    }
}
