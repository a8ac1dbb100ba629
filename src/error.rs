use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("Mount error: {0}")]
    MountError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Malformed oracle response: {0}")]
    OracleError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type PreviewResult<T> = Result<T, PreviewError>;
