use thiserror::Error;

/// Workspace-wide error taxonomy: every crate's local error type folds in
/// here via `From`, so the CLI can match one enum down to a single exit
/// code instead of re-deriving retcodes per crate.
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("{0} is required for this action")]
    FilenameRequired(&'static str),

    #[error("failed to load {path}: {source}")]
    FileLoad {
        path: std::path::PathBuf,
        #[source]
        source: fw_hex::HexError,
    },

    #[error("failed to initialize ({0})")]
    InitFailed(#[source] fw_loader::LoaderError),

    #[error("failed to erase ({0})")]
    EraseFailed(#[source] fw_loader::LoaderError),

    #[error("failed to verify ({0})")]
    VerifyFailed(#[source] fw_loader::LoaderError),

    #[error("verify failed due to data mismatch")]
    VerifyDataMismatch,

    #[error("invalid answer to command or timeout ({0})")]
    CommandFailed(#[source] fw_loader::LoaderError),

    #[error("update process failed due to a fatal error ({0})")]
    UpdateFailed(#[source] fw_package::PackageError),

    #[error("failed to program ({0})")]
    ProgramFailed(#[source] fw_loader::LoaderError),

    #[error("failed to set digest value ({0})")]
    DigestFailed(#[source] fw_loader::LoaderError),
}

impl UpdaterError {
    /// Mirrors `errors_dict`'s retcodes from the original tool; note
    /// `PROGRAM_FAILED` and `DIGEST_FAILED` share retcode 9 there, so this
    /// does too rather than inventing a tenth code.
    pub fn exit_code(&self) -> u8 {
        match self {
            UpdaterError::FilenameRequired(_) => 1,
            UpdaterError::FileLoad { .. } => 2,
            UpdaterError::InitFailed(_) => 3,
            UpdaterError::EraseFailed(_) => 4,
            UpdaterError::VerifyFailed(_) => 5,
            UpdaterError::VerifyDataMismatch => 6,
            UpdaterError::CommandFailed(_) => 7,
            UpdaterError::UpdateFailed(_) => 8,
            UpdaterError::ProgramFailed(_) => 9,
            UpdaterError::DigestFailed(_) => 9,
        }
    }
}
