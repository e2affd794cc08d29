use std::path::PathBuf;

use tracing::debug;

use super::error::InfraError;

const SOURCE: &str = "infra::templates";

/// Reads layout template sources from disk.
///
/// Templates are re-read per request; the source of truth stays editable
/// while the server runs, and caching rendered pages is the job of the
/// HTTP layer's cache-control headers, not this store.
pub struct LayoutStore {
    directory: PathBuf,
    extension: String,
}

impl LayoutStore {
    pub fn new(directory: PathBuf, extension: String) -> Self {
        Self {
            directory,
            extension,
        }
    }

    /// Load the template source for `layout`, keyed on disk as
    /// `<directory>/<layout>.<extension>`.
    pub async fn load(&self, layout: &str) -> Result<String, InfraError> {
        let path = self
            .directory
            .join(format!("{layout}.{}", self.extension));
        debug!(target: SOURCE, layout, path = %path.display(), "reading layout template");

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| InfraError::Template {
                path: path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_template_source_by_layout_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("layout.html"), "<html>{{ page.vars.title }}</html>")
            .expect("write template");

        let store = LayoutStore::new(dir.path().to_path_buf(), "html".to_string());
        let source = store.load("layout").await.expect("template source");
        assert_eq!(source, "<html>{{ page.vars.title }}</html>");
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LayoutStore::new(dir.path().to_path_buf(), "html".to_string());

        let error = store.load("nope").await.expect_err("missing template");
        assert!(matches!(error, InfraError::Template { .. }));
    }
}
