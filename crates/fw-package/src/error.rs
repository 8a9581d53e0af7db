use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to read package archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("package is missing required member: {0}")]
    MissingMember(String),

    #[error("failed to parse manifest.txt: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("manifest has no program entry with board-name \"master\"")]
    NoMaster,

    #[error("failed to decode firmware image {filename}: {source}")]
    Hex {
        filename: String,
        #[source]
        source: fw_hex::HexError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Loader(#[from] fw_loader::LoaderError),

    #[error("{0}")]
    Fatal(String),

    #[error("update cancelled by caller")]
    UserInterrupt,
}
