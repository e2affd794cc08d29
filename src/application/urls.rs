use crate::config::RemoteSettings;

/// Resolves document names and image references to fully-qualified locators
/// on the remote document host.
#[derive(Debug, Clone)]
pub struct DocumentUrls {
    base_url: String,
    file_extension: String,
    url_postfix: String,
    image_path: String,
}

impl DocumentUrls {
    pub fn from_settings(remote: &RemoteSettings) -> Self {
        Self {
            base_url: remote.base_url.clone(),
            file_extension: remote.file_extension.clone(),
            url_postfix: remote.url_postfix.clone(),
            image_path: remote.image_path.clone(),
        }
    }

    /// Locator of the document named `name`:
    /// `<base>/<name>.<extension><postfix>`.
    pub fn document_url(&self, name: &str) -> String {
        format!(
            "{}/{}.{}{}",
            self.base_url,
            name.trim_start_matches('/'),
            self.file_extension,
            self.url_postfix
        )
    }

    /// URL a relative image reference is served from.
    pub fn image_url(&self, name: &str) -> String {
        format!("{}/{}", self.image_path, name)
    }
}
