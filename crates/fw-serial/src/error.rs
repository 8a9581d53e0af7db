use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node {addr} never reached {status} (waited {waited:?})")]
    NodeTimeout {
        addr: u8,
        status: &'static str,
        waited: std::time::Duration,
    },

    #[error("master node {0} did not come online")]
    MasterNotReady(u8),

    #[error("diagnostic entry exhausted {attempts} attempts")]
    PreStageTimeout { attempts: u32 },

    #[error("pre-stage cancelled")]
    Cancelled,
}
