//! An in-memory [`SerialProtocol`] that scripts node status transitions, so
//! [`crate::prestage::run_jump_to_boot`] can be tested without real
//! hardware.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::SerialError;
use crate::protocol::{SerialProtocol, StatusLevel};

#[derive(Default)]
pub struct MockProtocol {
    statuses: HashMap<u8, StatusLevel>,
    /// Scripted inventory responses, keyed by (addr, request name). A
    /// missing entry simulates a collection failure, which callers treat
    /// as a warning rather than fatal.
    inventory: HashMap<(u8, String), Vec<u8>>,
    /// Nodes that should answer ENTER_DIAGNOSTIC by moving to `Diagnostic`;
    /// anything not listed stays wherever it already was.
    pub diagnostic_on_request: bool,
    pub closed: bool,
    pub jump_commands: Vec<u8>,
}

impl MockProtocol {
    pub fn new() -> Self {
        Self {
            diagnostic_on_request: true,
            ..Default::default()
        }
    }

    /// Pre-seed a node's power state, as if it were already online before
    /// the pre-stage started attaching nodes.
    pub fn power_on(&mut self, addr: u8) {
        self.statuses.insert(addr, StatusLevel::Normal);
    }

    /// Script the payload `addr` returns for `request`. An un-scripted
    /// (addr, request) pair fails as if the node never answered.
    pub fn script_inventory(&mut self, addr: u8, request: &str, payload: Vec<u8>) {
        self.inventory.insert((addr, request.to_string()), payload);
    }
}

impl SerialProtocol for MockProtocol {
    fn attach_node(&mut self, addr: u8) -> Result<(), SerialError> {
        self.statuses.entry(addr).or_insert(StatusLevel::PowerOff);
        Ok(())
    }

    fn wait_for_status(&mut self, addr: u8, _timeout: Duration) -> Result<StatusLevel, SerialError> {
        match self.statuses.get(&addr) {
            Some(StatusLevel::PowerOff) | None => Err(SerialError::NodeTimeout {
                addr,
                status: "non-POWER_OFF",
                waited: _timeout,
            }),
            Some(status) => Ok(*status),
        }
    }

    fn send_request_and_wait(
        &mut self,
        addr: u8,
        request: &str,
        _timeout: Duration,
    ) -> Result<StatusLevel, SerialError> {
        if request == "ENTER_DIAGNOSTIC" && self.diagnostic_on_request {
            self.statuses.insert(addr, StatusLevel::Diagnostic);
        }
        Ok(*self.statuses.get(&addr).unwrap_or(&StatusLevel::PowerOff))
    }

    fn send_request(
        &mut self,
        addr: u8,
        request: &str,
        mut on_complete: Box<dyn FnMut(StatusLevel) + Send>,
    ) -> Result<(), SerialError> {
        if request == "DIAG_JUMP_TO_BOOT" {
            self.jump_commands.push(addr);
        }
        let status = *self.statuses.get(&addr).unwrap_or(&StatusLevel::PowerOff);
        on_complete(status);
        Ok(())
    }

    fn send_request_and_read(
        &mut self,
        addr: u8,
        request: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, SerialError> {
        self.inventory
            .get(&(addr, request.to_string()))
            .cloned()
            .ok_or(SerialError::NodeTimeout {
                addr,
                status: "inventory response",
                waited: timeout,
            })
    }

    fn status(&self, addr: u8) -> StatusLevel {
        *self.statuses.get(&addr).unwrap_or(&StatusLevel::PowerOff)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.closed = true;
        Ok(())
    }
}
