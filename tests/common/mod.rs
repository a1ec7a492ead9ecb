use std::path::{Path, PathBuf};

use meds_dispenser::args::{SubCommands, TopLevelCmd};
use meds_dispenser::errors::AppError;
use meds_dispenser::medication::Medication;
use meds_dispenser::run_headless;
use meds_dispenser::store::MedicationStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// The app gets its own runtime, same as the binary would
#[allow(dead_code)]
pub fn headless_thread(
    arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
        .block_on(async move {
            run_headless(arg_config, parent_token).await?;
            Ok(())
        })
}

/// A scratch directory holding one config file and one medication list.
#[allow(dead_code)]
pub struct Workspace {
    pub dir: TempDir,
    config: Option<PathBuf>,
}

#[allow(dead_code)]
impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            config: None,
        }
    }

    /// Uses a copy of one of the files in `tests/test_configs`.
    pub fn with_config(name: &str) -> Self {
        let mut workspace = Self::new();
        let copy = workspace.dir.path().join(name);
        std::fs::copy(Path::new("tests/test_configs").join(name), &copy).unwrap();
        workspace.config = Some(copy);
        workspace
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("medications.json")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn args(&self, subcommands: SubCommands) -> TopLevelCmd {
        TopLevelCmd {
            config_override: Some(
                self.config
                    .clone()
                    .unwrap_or_else(|| self.dir.path().join("meds-dispenser.toml")),
            ),
            config_required: self.config.is_some(),
            no_save: self.config.is_some(),
            store_override: Some(self.store_path()),
            subcommands,
        }
    }

    pub fn run(&self, subcommands: SubCommands) -> Result<(), AppError> {
        headless_thread(self.args(subcommands), CancellationToken::new())
    }

    pub fn stored(&self) -> Vec<Medication> {
        MedicationStore::open(self.store_path()).medications().to_vec()
    }
}
