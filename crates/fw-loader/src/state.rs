use std::time::Duration;

use fw_protocol::QueryResponse;

/// Connection-scoped configuration, threaded down by value from the caller
/// rather than read from module-level globals.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub cmd_retries: u32,
    pub response_timeout: Duration,
    pub erase_timeout: Duration,
    pub polling_interval: Duration,
    pub polling_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            vendor_id: fw_usb::VENDOR_ID,
            product_id: fw_usb::PRODUCT_ID,
            cmd_retries: 3,
            response_timeout: Duration::from_millis(500),
            erase_timeout: fw_protocol::MIN_ERASE_TIMEOUT,
            polling_interval: Duration::from_millis(100),
            polling_timeout: Duration::from_secs(10),
        }
    }
}

/// How `connect` should locate the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Enumerate once; fail immediately if the board isn't present.
    Simple,
    /// Retry enumeration at `polling_interval` until `polling_timeout`
    /// elapses, for boards that take a moment to re-enumerate after reset.
    Polling,
    /// If USB enumeration fails, run the serial pre-stage to jump the board
    /// into bootloader mode, then retry enumeration once.
    Serial,
}

/// The loader's state machine. Each state that followed a QUERY carries the
/// response that produced it, so callers don't need to re-query to learn
/// the board's memory window.
#[derive(Debug, Clone)]
pub enum LoaderState {
    Disconnected,
    Connected { query: QueryResponse },
    Erased { query: QueryResponse },
    Programming { query: QueryResponse },
    ProgrammedUnsealed { query: QueryResponse },
    Sealed { query: QueryResponse },
    Jumped,
    Reset,
}

impl LoaderState {
    pub fn label(&self) -> &'static str {
        match self {
            LoaderState::Disconnected => "disconnected",
            LoaderState::Connected { .. } => "connected",
            LoaderState::Erased { .. } => "erased",
            LoaderState::Programming { .. } => "programming",
            LoaderState::ProgrammedUnsealed { .. } => "programmed (unsealed)",
            LoaderState::Sealed { .. } => "sealed",
            LoaderState::Jumped => "jumped",
            LoaderState::Reset => "reset",
        }
    }

    pub fn query(&self) -> Option<&QueryResponse> {
        match self {
            LoaderState::Connected { query }
            | LoaderState::Erased { query }
            | LoaderState::Programming { query }
            | LoaderState::ProgrammedUnsealed { query }
            | LoaderState::Sealed { query } => Some(query),
            _ => None,
        }
    }
}
