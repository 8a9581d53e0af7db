use std::collections::HashMap;
use std::io::{Read, Seek};

use fw_hex::DenseImage;
use fw_loader::FirmwareLoader;

use crate::error::PackageError;
use crate::manifest::Manifest;
use crate::progress::{ProgressEvent, StepStatus};

/// Inventory collected by the caller's board-init step: the master's
/// reported protocol level and which slave addresses answered.
#[derive(Debug, Clone)]
pub struct BoardInit {
    pub boot_master_protocol: u8,
    pub slaves_configuration: Vec<u8>,
}

const MASTER_DEVICE_ID: u8 = 255;

/// A loaded update package: manifest plus every referenced firmware image,
/// decoded eagerly so `process()` never touches the ZIP again.
#[derive(Debug)]
pub struct UpdatePackage {
    manifest: Manifest,
    images: HashMap<String, DenseImage>,
}

impl UpdatePackage {
    pub fn load(reader: impl Read + Seek) -> Result<Self, PackageError> {
        let mut archive = zip::ZipArchive::new(reader)?;

        let manifest: Manifest = {
            let mut entry = archive
                .by_name("manifest.txt")
                .map_err(|_| PackageError::MissingMember("manifest.txt".into()))?;
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            toml::from_str(&text)?
        };
        if manifest.master().is_none() {
            return Err(PackageError::NoMaster);
        }

        let mut images = HashMap::new();
        for program in &manifest.programs {
            if images.contains_key(&program.filename) {
                continue;
            }
            let mut entry = archive
                .by_name(&program.filename)
                .map_err(|_| PackageError::MissingMember(program.filename.clone()))?;
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            let sparse = fw_hex::load_hex(&text).map_err(|source| PackageError::Hex {
                filename: program.filename.clone(),
                source,
            })?;
            images.insert(program.filename.clone(), fw_hex::densify(&sparse, None));
        }

        Ok(Self { manifest, images })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn image_for(&self, filename: &str) -> &DenseImage {
        self.images
            .get(filename)
            .expect("load() decoded every manifest-referenced filename")
    }

    /// Runs the 5(6)-step pipeline: initialize, program master, (re-init if
    /// the first attempt failed but programming master succeeded), program
    /// slaves, jump.
    ///
    /// `board_init` and `loader_for` are supplied by the caller rather than
    /// this crate owning a connection — this keeps `fw-package` agnostic of
    /// whether boards are reached over plain USB, polling, or the serial
    /// pre-stage.
    pub fn process(
        &self,
        mut board_init: impl FnMut() -> Result<BoardInit, PackageError>,
        mut loader_for: impl FnMut(u8) -> Result<FirmwareLoader, PackageError>,
        mut progress: impl FnMut(ProgressEvent) -> bool,
    ) -> Result<(), PackageError> {
        let mut report_main = |op: &str, step: u32, progress: &mut dyn FnMut(ProgressEvent) -> bool| -> Result<(), PackageError> {
            let event = ProgressEvent {
                process: StepStatus {
                    current_op: op.to_string(),
                    step,
                    total_steps: 5,
                },
                subprocess: StepStatus::default(),
                problem: None,
            };
            if progress(event) {
                return Err(PackageError::UserInterrupt);
            }
            Ok(())
        };

        report_main("loading package", 1, &mut progress)?;
        report_main("initialize", 2, &mut progress)?;

        let mut initialize_ok = true;
        let mut board_info = match board_init() {
            Ok(info) => info,
            Err(e) => {
                log::warn!("need to reinitialize after programming master ({e})");
                initialize_ok = false;
                BoardInit {
                    boot_master_protocol: 0,
                    slaves_configuration: Vec::new(),
                }
            }
        };

        let master = self.manifest.master().ok_or(PackageError::NoMaster)?;

        report_main("programming master", 3, &mut progress)?;
        let master_result = (|| -> Result<(), PackageError> {
            let mut loader = loader_for(MASTER_DEVICE_ID)?;
            loader.erase()?;
            loader.program(self.image_for(&master.filename))?;
            loader.verify(self.image_for(&master.filename), true)?;
            loader.seal()?;
            loader.disconnect();
            Ok(())
        })();

        if let Err(e) = &master_result {
            log::warn!("failed to program master: {e}");
            let mut event = ProgressEvent::default();
            event.problem = Some("failed to program master 1st attempt".to_string());
            progress(event);
            if !initialize_ok {
                return Err(PackageError::Fatal(format!(
                    "failed to program master and init: {e}"
                )));
            }
        }

        if !initialize_ok {
            board_info = board_init().map_err(|e| PackageError::Fatal(format!("failed to initialize: {e}")))?;
        }

        if board_info.boot_master_protocol < 1 {
            return Err(PackageError::Fatal("upgrade not supported by master".into()));
        }

        let mut program_steps: Vec<(u8, &str)> = Vec::new();
        for program in &self.manifest.programs {
            for &addr in &program.addresses {
                if addr != MASTER_DEVICE_ID && board_info.slaves_configuration.contains(&addr) {
                    program_steps.push((addr, program.filename.as_str()));
                }
            }
        }

        report_main("programming slaves", 4, &mut progress)?;
        let total = program_steps.len() as u32;
        for (i, (addr, filename)) in program_steps.iter().enumerate() {
            let event = ProgressEvent {
                process: StepStatus {
                    current_op: "programming slaves".to_string(),
                    step: 4,
                    total_steps: 5,
                },
                subprocess: StepStatus {
                    current_op: format!("programming slave #{addr}"),
                    step: i as u32 + 1,
                    total_steps: total,
                },
                problem: None,
            };
            if progress(event) {
                return Err(PackageError::UserInterrupt);
            }

            let result = (|| -> Result<(), PackageError> {
                let mut loader = loader_for(*addr)?;
                let proto_ver = loader.state().query().map(|q| q.proto_ver).unwrap_or(0);
                if proto_ver < 1 {
                    return Err(PackageError::Fatal(format!(
                        "slave {addr} does not support upgrade (proto_ver={proto_ver})"
                    )));
                }
                loader.erase()?;
                loader.program(self.image_for(filename))?;
                loader.verify(self.image_for(filename), true)?;
                loader.seal()?;
                loader.disconnect();
                Ok(())
            })();

            if let Err(e) = result {
                log::warn!("failed to program slave {addr}: {e}");
                let mut event = ProgressEvent::default();
                event.problem = Some(format!("failed to program slave with address {addr}, {e}"));
                progress(event);
            }
        }

        report_main("jumping to application", 5, &mut progress)?;
        let mut loader = loader_for(MASTER_DEVICE_ID)?;
        loader.jump()?;
        loader.disconnect();

        Ok(())
    }
}
