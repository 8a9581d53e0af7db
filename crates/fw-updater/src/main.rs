mod cli;
mod error;

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use clap::Parser;

use cli::{Cli, Command, ConnectionArgs};
use error::UpdaterError;
use fw_loader::{ConnectMode, FirmwareLoader, LoaderError};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), UpdaterError> {
    match &cli.command {
        Command::Info => cmd_info(&cli.connection),
        Command::Program { hex_file, no_verify } => cmd_program(&cli.connection, hex_file, !no_verify),
        Command::Verify { hex_file } => cmd_verify(&cli.connection, hex_file),
        Command::Jump => cmd_jump(&cli.connection),
        Command::Reset => cmd_reset(&cli.connection),
        Command::Update { package_file } => cmd_update(&cli.connection, package_file),
    }
}

/// Builds a closure satisfying `connect`'s serial-pre-stage hook for
/// `ConnectMode::Serial`; unused by the other two modes. When `inventory`
/// is given, the pre-stage's collected slave configuration and versions are
/// stashed there for the caller to read back once the closure returns.
fn prestage_closure<'a>(
    connection: &'a ConnectionArgs,
    inventory: Option<&'a Mutex<fw_serial::JumpToBootResult>>,
) -> impl FnMut() -> Result<(), LoaderError> + 'a {
    move || {
        let mut protocol = fw_serial::ThreadedSerialProtocol::open(&connection.serial_port, 115_200)
            .map_err(|e| LoaderError::PreStage(e.to_string()))?;
        let cancel = Arc::new(AtomicBool::new(false));
        let result = fw_serial::run_jump_to_boot(&mut protocol, &connection.prestage_config(), &cancel)
            .map_err(|e| LoaderError::PreStage(e.to_string()))?;
        if let Some(sink) = inventory {
            *sink.lock().expect("inventory lock poisoned") = result;
        }
        Ok(())
    }
}

fn connect(connection: &ConnectionArgs) -> Result<FirmwareLoader, UpdaterError> {
    let mut loader = FirmwareLoader::new(connection.loader_config());
    let mode = connection.connect_mode();
    let mut prestage = prestage_closure(connection, None);
    let prestage_ref: Option<&mut dyn FnMut() -> Result<(), LoaderError>> = match mode {
        ConnectMode::Serial => Some(&mut prestage),
        _ => None,
    };
    loader
        .connect(connection.device_id, mode, prestage_ref)
        .map_err(UpdaterError::InitFailed)?;
    Ok(loader)
}

fn cmd_info(connection: &ConnectionArgs) -> Result<(), UpdaterError> {
    let loader = connect(connection)?;
    let query = loader.state().query().expect("connect() always sets a query");
    println!("start_addr:    {:#08X}", query.start_addr);
    println!("length_words:  {:#X}", query.length_words);
    println!("proto_ver:     {}", query.proto_ver);
    println!("boot_version:  {:?}", query.boot_version);
    println!("boot_status:   {}", query.boot_status);
    Ok(())
}

fn load_image(hex_file: &std::path::Path) -> Result<fw_hex::DenseImage, UpdaterError> {
    fw_hex::load_hex_file(hex_file, None).map_err(|source| UpdaterError::FileLoad {
        path: hex_file.to_path_buf(),
        source,
    })
}

fn cmd_program(connection: &ConnectionArgs, hex_file: &std::path::Path, verify: bool) -> Result<(), UpdaterError> {
    let image = load_image(hex_file)?;
    let mut loader = connect(connection)?;

    loader.erase().map_err(UpdaterError::EraseFailed)?;
    loader.program(&image).map_err(UpdaterError::ProgramFailed)?;

    if verify {
        match loader.verify(&image, true) {
            Ok(()) => {}
            Err(LoaderError::VerifyMismatch { .. }) => return Err(UpdaterError::VerifyDataMismatch),
            Err(e) => return Err(UpdaterError::VerifyFailed(e)),
        }
    }

    loader.seal().map_err(UpdaterError::DigestFailed)?;
    loader.disconnect();
    println!("programmed and sealed {}", hex_file.display());
    Ok(())
}

fn cmd_verify(connection: &ConnectionArgs, hex_file: &std::path::Path) -> Result<(), UpdaterError> {
    let image = load_image(hex_file)?;
    let mut loader = connect(connection)?;

    match loader.verify(&image, true) {
        Ok(()) => {
            println!("verify OK");
            Ok(())
        }
        Err(LoaderError::VerifyMismatch { .. }) => Err(UpdaterError::VerifyDataMismatch),
        Err(e) => Err(UpdaterError::VerifyFailed(e)),
    }
}

fn cmd_jump(connection: &ConnectionArgs) -> Result<(), UpdaterError> {
    let mut loader = connect(connection)?;
    loader.jump().map_err(UpdaterError::CommandFailed)?;
    Ok(())
}

fn cmd_reset(connection: &ConnectionArgs) -> Result<(), UpdaterError> {
    let mut loader = connect(connection)?;
    loader.reset().map_err(UpdaterError::CommandFailed)?;
    Ok(())
}

/// Device id the master always answers on; the only id QUERY accepts
/// without having first discovered the bus's slave addresses.
const MASTER_DEVICE_ID: u8 = 0xFF;

fn cmd_update(connection: &ConnectionArgs, package_file: &std::path::Path) -> Result<(), UpdaterError> {
    let bytes = std::fs::read(package_file).map_err(|source| UpdaterError::FileLoad {
        path: package_file.to_path_buf(),
        source: fw_hex::HexError::Io(source),
    })?;
    let package = fw_package::UpdatePackage::load(std::io::Cursor::new(bytes))
        .map_err(UpdaterError::UpdateFailed)?;

    let connection = connection.clone();
    let inventory: Mutex<fw_serial::JumpToBootResult> = Mutex::new(fw_serial::JumpToBootResult::default());
    let result = package.process(
        || {
            // Always reaches the master over the serial pre-stage to
            // rediscover which slaves are enabled, since a previous
            // programming attempt may have changed the bus topology.
            let mut loader = FirmwareLoader::new(connection.loader_config());
            let mut prestage = prestage_closure(&connection, Some(&inventory));
            let query = loader
                .connect(MASTER_DEVICE_ID, ConnectMode::Serial, Some(&mut prestage))
                .map_err(|e| fw_package::PackageError::Fatal(format!("board init failed: {e}")))?
                .clone();
            loader.disconnect();
            let collected = inventory.lock().expect("inventory lock poisoned").clone();
            Ok(fw_package::BoardInit {
                boot_master_protocol: query.proto_ver,
                slaves_configuration: collected.slaves_configuration,
            })
        },
        |device_id| {
            // Master and slaves are reached by address alone at this
            // point; the bootloader relay only works once the pre-stage
            // has already jumped every node, so no re-prestage here.
            let mut loader = FirmwareLoader::new(connection.loader_config());
            loader
                .connect(device_id, ConnectMode::Simple, None)
                .map_err(|e| fw_package::PackageError::Fatal(format!("device {device_id}: {e}")))?;
            Ok(loader)
        },
        |event| {
            if let Some(problem) = &event.problem {
                log::warn!("{problem}");
            } else {
                log::info!(
                    "{} ({}/{})",
                    event.process.current_op,
                    event.process.step,
                    event.process.total_steps
                );
            }
            false
        },
    );

    result.map_err(UpdaterError::UpdateFailed)
}
