use meds_dispenser::args::{ListCmd, SubCommands, TopLevelCmd};
use meds_dispenser::errors::AppError;

use ntest::timeout;
use tokio_util::sync::CancellationToken;

use common::{headless_thread, Workspace};
mod common;

fn run_with_config(path: &str) -> Result<(), AppError> {
    let workspace = Workspace::new();
    let arg_config = TopLevelCmd {
        config_override: Some(path.into()),
        config_required: true,
        no_save: true,
        store_override: Some(workspace.store_path()),
        subcommands: SubCommands::List(ListCmd {}),
    };
    headless_thread(arg_config, CancellationToken::new())
}

#[test]
#[timeout(3000)] // 3s timeout
fn misspelled_bool() {
    let result = run_with_config("tests/test_configs/misspelled_bool.toml");
    assert!(matches!(result, Err(AppError::Config(_))), "{result:?}");
}

#[test]
#[timeout(3000)]
fn missing_end_quote() {
    let result = run_with_config("tests/test_configs/missing_end_quote.toml");
    assert!(matches!(result, Err(AppError::Config(_))), "{result:?}");
}

#[test]
#[timeout(3000)]
fn required_config_missing() {
    let result = run_with_config("tests/test_configs/does_not_exist.toml");
    assert!(matches!(result, Err(AppError::ConfigMissing(_))), "{result:?}");
}

#[test]
#[timeout(3000)]
fn defaults_are_written_out() {
    let workspace = Workspace::new();
    workspace.run(SubCommands::List(ListCmd {})).unwrap();
    let written = std::fs::read_to_string(workspace.dir.path().join("meds-dispenser.toml")).unwrap();
    assert!(written.contains("chunk_size = 20"), "{written}");
    assert!(written.contains("12345678-1234-1234-1234-123456789abc"), "{written}");
}
