use serde::Deserialize;

/// `manifest.txt`, decoded as TOML: `programs: [{board-name, filename,
/// addresses}]`, with exactly one entry whose `board-name` is `"master"`.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub programs: Vec<ProgramEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgramEntry {
    #[serde(rename = "board-name")]
    pub board_name: String,
    pub filename: String,
    pub addresses: Vec<u8>,
}

impl Manifest {
    pub fn master(&self) -> Option<&ProgramEntry> {
        self.programs.iter().find(|p| p.board_name == "master")
    }
}
