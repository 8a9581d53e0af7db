//! # fw-package: update package driver
//!
//! An update package is a ZIP archive holding a TOML manifest and one Intel
//! HEX file per board. [`UpdatePackage::process`] drives the
//! initialize → program-master → (re-initialize) → program-slaves → jump
//! pipeline, reporting two-level progress along the way.
//!
//! ## Design Philosophy
//!
//! Like `fw-loader::connect`'s serial pre-stage hook, both the board-init
//! step and the per-device loader construction are supplied by the caller
//! as closures rather than owned by this crate — `fw-package` only encodes
//! *ordering* (master before slaves, re-init only if warranted), not how a
//! connection to any particular board is made.

mod error;
mod manifest;
mod package;
mod progress;

pub use error::PackageError;
pub use manifest::{Manifest, ProgramEntry};
pub use package::{BoardInit, UpdatePackage};
pub use progress::{ProgressEvent, StepStatus};
