use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "fw-updater", about = "Firmware upgrader for RS-485 MCU boards")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ConnectionArgs {
    /// How to locate the board before talking to it.
    #[arg(long, value_enum, default_value_t = Strategy::Simple)]
    pub strategy: Strategy,

    /// Serial device used by `--strategy serial`'s pre-stage.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub serial_port: String,

    /// Number of times to retry a retriable command before giving up.
    #[arg(long, default_value_t = 3)]
    pub cmd_retries: u32,

    /// Device id to address on the bus; 0xFF talks to whichever board
    /// answers first (the usual case for a single master).
    #[arg(long, default_value_t = 0xFF)]
    pub device_id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    Simple,
    Polling,
    Serial,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and print the board's QUERY response.
    Info,
    /// Erase, program, and verify a single Intel HEX file, then seal it.
    Program {
        hex_file: std::path::PathBuf,
        /// Skip the post-program verify pass.
        #[arg(long)]
        no_verify: bool,
    },
    /// Read back and compare a board's memory window against a HEX file.
    Verify { hex_file: std::path::PathBuf },
    /// Jump the board from bootloader into its application.
    Jump,
    /// Reset the bootloader's internal bookkeeping.
    Reset,
    /// Run a full update package (ZIP of manifest + per-board HEX files).
    Update { package_file: std::path::PathBuf },
}

impl ConnectionArgs {
    pub fn connect_mode(&self) -> fw_loader::ConnectMode {
        match self.strategy {
            Strategy::Simple => fw_loader::ConnectMode::Simple,
            Strategy::Polling => fw_loader::ConnectMode::Polling,
            Strategy::Serial => fw_loader::ConnectMode::Serial,
        }
    }

    pub fn loader_config(&self) -> fw_loader::ConnectConfig {
        fw_loader::ConnectConfig {
            cmd_retries: self.cmd_retries,
            ..Default::default()
        }
    }

    pub fn prestage_config(&self) -> fw_serial::PreStageConfig {
        fw_serial::PreStageConfig::duplex()
    }
}
