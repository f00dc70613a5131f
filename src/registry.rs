use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read source registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source registry {path} is not a JSON list of URLs: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered list of CRL source locators.
#[derive(Debug, Clone)]
pub enum SourceRegistry {
    /// A JSON file holding an array of URL strings, read on every run
    File(PathBuf),
    Static(Vec<String>),
}

impl SourceRegistry {
    /// Loads the locators, trimmed, without blanks or repeats, in file order.
    pub async fn load(&self) -> Result<Vec<String>, RegistryError> {
        let urls = match self {
            Self::File(path) => {
                let raw = tokio::fs::read(path).await.map_err(|source| RegistryError::Io {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_slice::<Vec<String>>(&raw).map_err(|source| {
                    RegistryError::Format {
                        path: path.clone(),
                        source,
                    }
                })?
            }
            Self::Static(urls) => urls.clone(),
        };

        let mut seen = HashSet::new();
        let sources: Vec<String> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .filter(|url| seen.insert(url.to_string()))
            .map(str::to_string)
            .collect();

        debug!(count = sources.len(), "Loaded CRL source registry");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"["http://a.example/1.crl", " http://b.example/2.crl ", "", "http://a.example/1.crl"]"#
        )
        .unwrap();

        let sources = SourceRegistry::File(file.path().to_path_buf())
            .load()
            .await
            .unwrap();

        assert_eq!(
            sources,
            vec!["http://a.example/1.crl", "http://b.example/2.crl"]
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = SourceRegistry::File(PathBuf::from("/nonexistent/crl_urls.json"))
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"urls": []}}"#).unwrap();

        let err = SourceRegistry::File(file.path().to_path_buf())
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Format { .. }));
    }
}
