//! Persistence of generated and signed XML artifacts.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Where a document's artifacts go, as named in the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLocation {
    #[serde(rename = "directorioGuardarXML")]
    pub directory: PathBuf,
    #[serde(rename = "nombreArchivoXML")]
    pub xml_file_name: String,
    #[serde(rename = "directorioGuardarXMLFirmados")]
    pub signed_directory: PathBuf,
    #[serde(rename = "nombreArchivoXMLFirmado")]
    pub signed_file_name: String,
}

impl ArtifactLocation {
    pub fn new(
        directory: impl Into<PathBuf>,
        xml_file_name: impl Into<String>,
        signed_directory: impl Into<PathBuf>,
        signed_file_name: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            xml_file_name: xml_file_name.into(),
            signed_directory: signed_directory.into(),
            signed_file_name: signed_file_name.into(),
        }
    }

    /// Blank file names default to `<access key>.xml` for the generated XML
    /// and `<access key>_firmado.xml` for the signed one, so both artifacts
    /// can share a directory.
    pub fn xml_path(&self, access_key: &str) -> PathBuf {
        self.directory
            .join(file_name(&self.xml_file_name, access_key, ""))
    }

    pub fn signed_path(&self, access_key: &str) -> PathBuf {
        self.signed_directory
            .join(file_name(&self.signed_file_name, access_key, SIGNED_SUFFIX))
    }
}

const SIGNED_SUFFIX: &str = "_firmado";

fn file_name(name: &str, access_key: &str, suffix: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("{access_key}{suffix}.xml")
    } else {
        name.to_string()
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write_xml(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        xml: &str,
    ) -> Result<PathBuf, ArtifactError>;

    async fn write_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        signed: &[u8],
    ) -> Result<PathBuf, ArtifactError>;

    async fn read_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
    ) -> Result<Vec<u8>, ArtifactError>;
}

/// Filesystem store; directories are created on first write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

async fn write_file(path: PathBuf, contents: &[u8]) -> Result<PathBuf, ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| io_error(parent, source))?;
    }
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| io_error(&path, source))?;
    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(path)
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write_xml(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        xml: &str,
    ) -> Result<PathBuf, ArtifactError> {
        write_file(location.xml_path(access_key), xml.as_bytes()).await
    }

    async fn write_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
        signed: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        write_file(location.signed_path(access_key), signed).await
    }

    async fn read_signed(
        &self,
        location: &ArtifactLocation,
        access_key: &str,
    ) -> Result<Vec<u8>, ArtifactError> {
        let path = location.signed_path(access_key);
        tokio::fs::read(&path)
            .await
            .map_err(|source| io_error(&path, source))
    }
}
