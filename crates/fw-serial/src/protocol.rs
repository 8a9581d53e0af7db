use std::time::Duration;

use crate::error::SerialError;

/// A node's last-known status level, as reported by its status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    PowerOff,
    Alarm,
    Diagnostic,
    Normal,
}

impl StatusLevel {
    pub fn label(&self) -> &'static str {
        match self {
            StatusLevel::PowerOff => "POWER_OFF",
            StatusLevel::Alarm => "ALARM",
            StatusLevel::Diagnostic => "DIAGNOSTIC",
            StatusLevel::Normal => "NORMAL",
        }
    }
}

/// The RS-232/485 link interface the pre-stage is built against. Consumed,
/// not defined by this crate's own orchestration logic, so the jump
/// sequence in [`crate::prestage`] can be tested against [`mock::MockProtocol`]
/// without a real link.
pub trait SerialProtocol: Send {
    /// Register interest in a node at `addr`; subsequent status/reqeusts
    /// refer to it.
    fn attach_node(&mut self, addr: u8) -> Result<(), SerialError>;

    /// Block until `addr`'s status differs from `PowerOff`, or `timeout`
    /// elapses.
    fn wait_for_status(&mut self, addr: u8, timeout: Duration) -> Result<StatusLevel, SerialError>;

    /// Send `request` to `addr` and block for its completion, returning the
    /// node's status immediately after.
    fn send_request_and_wait(
        &mut self,
        addr: u8,
        request: &str,
        timeout: Duration,
    ) -> Result<StatusLevel, SerialError>;

    /// Send `request` to `addr` without waiting; `on_complete` runs once the
    /// link sees a response (or never, if the node is gone — callers
    /// enforce their own timeout on the aggregate).
    fn send_request(
        &mut self,
        addr: u8,
        request: &str,
        on_complete: Box<dyn FnMut(StatusLevel) + Send>,
    ) -> Result<(), SerialError>;

    /// Send `request` to `addr` and block for its response payload, used
    /// for inventory reads (`READ_SLAVES_CONFIGURATION`, `FW_VERSIONS`,
    /// `BOOT_VERSIONS`) rather than a status transition.
    fn send_request_and_read(
        &mut self,
        addr: u8,
        request: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, SerialError>;

    /// Last-known status for `addr`, without blocking; `PowerOff` if never
    /// reported.
    fn status(&self, addr: u8) -> StatusLevel;

    /// Close the link, stopping the background event loop.
    fn close(&mut self) -> Result<(), SerialError>;
}
