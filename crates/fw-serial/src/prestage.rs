use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SerialError;
use crate::protocol::{SerialProtocol, StatusLevel};

/// Tunables for [`run_jump_to_boot`]. The spec's hardcoded 300s/20s
/// power-on timeouts and fixed 3-attempt diagnostic retry become defaults
/// here rather than constants, so a caller with a slower bus can widen them.
#[derive(Debug, Clone)]
pub struct PreStageConfig {
    /// `true` selects the single duplex master at address 200; `false`
    /// selects the multi-drop addresses 50..56, with 50 as master.
    pub duplex: bool,
    pub power_on_timeout: Duration,
    pub diagnostic_attempts: u32,
    /// Settle time after commanding diagnostic entry, before re-checking
    /// status (5s in the original sequence).
    pub diagnostic_settle: Duration,
    /// Settle time after DIAG_JUMP_TO_BOOT before closing the link (1s in
    /// the original sequence).
    pub post_jump_settle: Duration,
}

impl Default for PreStageConfig {
    fn default() -> Self {
        Self {
            duplex: false,
            power_on_timeout: Duration::from_secs(20),
            diagnostic_attempts: 3,
            diagnostic_settle: Duration::from_secs(5),
            post_jump_settle: Duration::from_secs(1),
        }
    }
}

impl PreStageConfig {
    pub fn duplex() -> Self {
        Self {
            duplex: true,
            power_on_timeout: Duration::from_secs(300),
            ..Self::default()
        }
    }

    fn node_addrs(&self) -> Vec<u8> {
        if self.duplex {
            vec![200]
        } else {
            (50..56).collect()
        }
    }
}

/// Inventory collected from the master once every node reaches diagnostic
/// status: which slave addresses the master reports as enabled, and the
/// raw app/boot version payloads for master + slaves.
#[derive(Debug, Clone, Default)]
pub struct JumpToBootResult {
    pub online: Vec<u8>,
    pub slaves_configuration: Vec<u8>,
    pub fw_versions: Vec<u8>,
    pub boot_versions: Vec<u8>,
}

/// `READ_SLAVES_CONFIGURATION`'s response is a bitset: bit i of byte i/8
/// means slave address i+1 is enabled.
fn decode_slaves_configuration(bits: &[u8]) -> Vec<u8> {
    let mut addrs = Vec::new();
    for (byte_idx, byte) in bits.iter().enumerate() {
        for bit in 0..8u32 {
            if byte & (1 << bit) != 0 {
                addrs.push((byte_idx * 8 + bit as usize + 1) as u8);
            }
        }
    }
    addrs
}

const INVENTORY_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the wait-ready → enter-diagnostic → inventory → jump-to-boot
/// sequence that makes an application jump into bootloader mode over the
/// RS-232/485 link. `cancel` is checked between every blocking step so a
/// caller can abort a pre-stage that is taking too long.
///
/// The link is always closed on every exit path, including early returns on
/// error or cancellation.
pub fn run_jump_to_boot(
    protocol: &mut dyn SerialProtocol,
    config: &PreStageConfig,
    cancel: &Arc<AtomicBool>,
) -> Result<JumpToBootResult, SerialError> {
    let result = run_jump_to_boot_inner(protocol, config, cancel);
    let _ = protocol.close();
    result
}

fn run_jump_to_boot_inner(
    protocol: &mut dyn SerialProtocol,
    config: &PreStageConfig,
    cancel: &Arc<AtomicBool>,
) -> Result<JumpToBootResult, SerialError> {
    let addrs = config.node_addrs();
    let master_addr = addrs[0];

    for &addr in &addrs {
        check_cancelled(cancel)?;
        protocol.attach_node(addr)?;
    }

    let mut online = Vec::new();
    for &addr in &addrs {
        check_cancelled(cancel)?;
        match protocol.wait_for_status(addr, config.power_on_timeout) {
            Ok(_) => online.push(addr),
            Err(SerialError::NodeTimeout { .. }) => {
                log::warn!("node {addr} never powered on")
            }
            Err(e) => return Err(e),
        }
    }
    if !online.contains(&master_addr) {
        return Err(SerialError::MasterNotReady(master_addr));
    }
    if online.len() != addrs.len() {
        let missing: Vec<u8> = addrs.iter().copied().filter(|a| !online.contains(a)).collect();
        log::warn!("nodes not ready: {missing:?}");
    }

    let mut reached_diagnostic = false;
    for attempt in 1..=config.diagnostic_attempts {
        check_cancelled(cancel)?;
        log::info!("attempt #{attempt}: commanding nodes into diagnostic status");
        for &addr in &online {
            protocol.send_request_and_wait(addr, "ENTER_DIAGNOSTIC", Duration::from_secs(5))?;
        }
        std::thread::sleep(config.diagnostic_settle);
        if online.iter().all(|&addr| protocol.status(addr) == StatusLevel::Diagnostic) {
            reached_diagnostic = true;
            break;
        }
        log::warn!("at least one node not in diagnostic status");
    }
    if !reached_diagnostic {
        return Err(SerialError::PreStageTimeout {
            attempts: config.diagnostic_attempts,
        });
    }

    check_cancelled(cancel)?;
    let mut slaves_configuration = Vec::new();
    let mut fw_versions = Vec::new();
    let mut boot_versions = Vec::new();
    match protocol.send_request_and_read(master_addr, "READ_SLAVES_CONFIGURATION", INVENTORY_TIMEOUT) {
        Ok(bits) => slaves_configuration = decode_slaves_configuration(&bits),
        Err(e) => log::warn!("failed to collect slave configuration: {e}"),
    }
    match protocol.send_request_and_read(master_addr, "FW_VERSIONS", INVENTORY_TIMEOUT) {
        Ok(bytes) => fw_versions = bytes,
        Err(e) => log::warn!("failed to collect fw versions: {e}"),
    }
    match protocol.send_request_and_read(master_addr, "BOOT_VERSIONS", INVENTORY_TIMEOUT) {
        Ok(bytes) => boot_versions = bytes,
        Err(e) => log::warn!("failed to collect boot versions: {e}"),
    }

    check_cancelled(cancel)?;
    for &addr in &online {
        protocol.send_request(addr, "DIAG_JUMP_TO_BOOT", Box::new(|_| {}))?;
    }
    // Don't wait for a response: the bootloader takes over the link as
    // soon as it starts, so there is nothing left to answer with.
    std::thread::sleep(config.post_jump_settle);

    Ok(JumpToBootResult {
        online,
        slaves_configuration,
        fw_versions,
        boot_versions,
    })
}

fn check_cancelled(cancel: &Arc<AtomicBool>) -> Result<(), SerialError> {
    if cancel.load(Ordering::Relaxed) {
        Err(SerialError::Cancelled)
    } else {
        Ok(())
    }
}
