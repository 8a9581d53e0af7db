//! # fw-serial: RS-232/485 pre-stage
//!
//! When a board can't be found on USB, it may still be running its
//! application and listening on an RS-232/485 link. This crate drives that
//! link to command the application into bootloader mode so the caller can
//! retry USB enumeration.
//!
//! ## Design Philosophy
//!
//! [`SerialProtocol`] is consumed, not defined, by [`prestage`]: the
//! orchestration logic (wait-ready, enter-diagnostic with retries, jump,
//! cleanup) is independent of how bytes move over the wire, so it is
//! exercised in tests against [`mock::MockProtocol`] and only wired to a
//! real port (via [`ThreadedSerialProtocol`]) at the edges.

mod error;
mod prestage;
mod protocol;
mod threaded;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::SerialError;
pub use prestage::{run_jump_to_boot, JumpToBootResult, PreStageConfig};
pub use protocol::{SerialProtocol, StatusLevel};
pub use threaded::ThreadedSerialProtocol;

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockProtocol;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config() -> PreStageConfig {
        PreStageConfig {
            duplex: true,
            power_on_timeout: Duration::from_millis(10),
            diagnostic_attempts: 3,
            diagnostic_settle: Duration::from_millis(1),
            post_jump_settle: Duration::from_millis(1),
        }
    }

    #[test]
    fn duplex_jump_runs_the_full_sequence() {
        let mut protocol = MockProtocol::new();
        protocol.power_on(200);
        protocol.script_inventory(200, "READ_SLAVES_CONFIGURATION", vec![0b0000_0101]);
        protocol.script_inventory(200, "FW_VERSIONS", vec![1, 0, 0]);
        protocol.script_inventory(200, "BOOT_VERSIONS", vec![1, 1, 0, 0]);
        let cancel = Arc::new(AtomicBool::new(false));

        let result = run_jump_to_boot(&mut protocol, &fast_config(), &cancel).unwrap();
        assert_eq!(result.online, vec![200]);
        assert_eq!(result.slaves_configuration, vec![1, 3]);
        assert_eq!(result.fw_versions, vec![1, 0, 0]);
        assert_eq!(result.boot_versions, vec![1, 1, 0, 0]);
        assert_eq!(protocol.jump_commands, vec![200]);
        assert!(protocol.closed);
    }

    #[test]
    fn master_never_powering_on_fails_fast() {
        let mut protocol = MockProtocol::new();
        // nothing powered on
        let cancel = Arc::new(AtomicBool::new(false));

        let err = run_jump_to_boot(&mut protocol, &fast_config(), &cancel).unwrap_err();
        assert!(matches!(err, SerialError::MasterNotReady(200)));
        assert!(protocol.closed, "link must close even on failure");
    }

    #[test]
    fn multidrop_tolerates_missing_slaves() {
        let mut protocol = MockProtocol::new();
        protocol.power_on(50); // master only; 51..56 never come online
        let cancel = Arc::new(AtomicBool::new(false));

        let mut config = fast_config();
        config.duplex = false;

        let result = run_jump_to_boot(&mut protocol, &config, &cancel).unwrap();
        assert_eq!(result.online, vec![50]);
        // Master never scripted an inventory response; collection failures
        // are warnings, not fatal, so the sequence still completes.
        assert!(result.slaves_configuration.is_empty());
    }

    #[test]
    fn cancellation_before_start_stops_immediately_and_closes() {
        let mut protocol = MockProtocol::new();
        protocol.power_on(200);
        let cancel = Arc::new(AtomicBool::new(true));

        let err = run_jump_to_boot(&mut protocol, &fast_config(), &cancel).unwrap_err();
        assert!(matches!(err, SerialError::Cancelled));
        assert!(protocol.closed);
    }

    #[test]
    fn diagnostic_entry_exhaustion_fails_with_prestage_timeout() {
        let mut protocol = MockProtocol::new();
        protocol.power_on(200);
        protocol.diagnostic_on_request = false; // nodes never reach DIAGNOSTIC
        let cancel = Arc::new(AtomicBool::new(false));

        let err = run_jump_to_boot(&mut protocol, &fast_config(), &cancel).unwrap_err();
        assert!(matches!(err, SerialError::PreStageTimeout { attempts: 3 }));
        assert!(protocol.jump_commands.is_empty(), "must not jump without reaching diagnostic");
        assert!(protocol.closed, "link must close even on failure");
    }
}
