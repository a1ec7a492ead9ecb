use meds_dispenser::args::{
    AddCmd, ClearCmd, ImportCmd, PayloadCmd, RemoveCmd, SendCmd, SubCommands,
};
use meds_dispenser::errors::AppError;
use meds_dispenser::payload::{decode, FrameError, Markers};

use ntest::timeout;

use common::Workspace;
mod common;

fn import(path: &str) -> SubCommands {
    SubCommands::Import(ImportCmd { file: path.into() })
}

fn dry_run() -> SubCommands {
    SubCommands::Send(SendCmd {
        device: None,
        remember: false,
        dry_run: true,
    })
}

#[test]
#[timeout(5000)]
fn import_replaces_wholesale() {
    let workspace = Workspace::new();
    workspace
        .run(SubCommands::Add(AddCmd {
            tube: "tube6".into(),
            name: "Old".into(),
            amount: "1".into(),
            dose: vec!["10:00=1".into()],
        }))
        .unwrap();
    workspace.run(import("tests/fixtures/schedule.json")).unwrap();

    let stored = workspace.stored();
    let names: Vec<_> = stored.iter().map(|m| m.name.as_str()).collect();
    // tube1 appears twice in the file, the later entry wins
    assert_eq!(names, vec!["Vitamin D", "Paracetamol"]);
}

#[test]
#[timeout(5000)]
fn invalid_import_keeps_current_list() {
    let workspace = Workspace::new();
    workspace.run(import("tests/fixtures/schedule.json")).unwrap();
    let before = workspace.stored();

    let result = workspace.run(import("tests/fixtures/bad_time.json"));
    assert!(matches!(result, Err(AppError::InvalidMedication(_))), "{result:?}");
    let not_json = workspace.write("notes.json", "tube1: aspirin");
    let result = workspace.run(import(not_json.to_str().unwrap()));
    assert!(matches!(result, Err(AppError::Json(_))), "{result:?}");

    assert_eq!(workspace.stored(), before);
}

#[test]
#[timeout(5000)]
fn manual_entry_validation() {
    let workspace = Workspace::new();
    let result = workspace.run(SubCommands::Add(AddCmd {
        tube: "tube1".into(),
        name: "Aspirin".into(),
        amount: "ten".into(),
        dose: vec!["08:00=1 tablet".into()],
    }));
    assert!(matches!(result, Err(AppError::InvalidMedication(_))));
    assert!(workspace.stored().is_empty());
}

#[test]
#[timeout(5000)]
fn remove_and_clear() {
    let workspace = Workspace::new();
    workspace.run(import("tests/fixtures/schedule.json")).unwrap();

    workspace
        .run(SubCommands::Remove(RemoveCmd { position: 1 }))
        .unwrap();
    let stored = workspace.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Paracetamol");

    let result = workspace.run(SubCommands::Remove(RemoveCmd { position: 5 }));
    assert!(matches!(
        result,
        Err(AppError::NoSuchMedication { index: 5, len: 1 })
    ));

    workspace.run(SubCommands::Clear(ClearCmd {})).unwrap();
    assert!(workspace.stored().is_empty());
}

#[test]
#[timeout(5000)]
fn empty_list_is_not_sent() {
    let workspace = Workspace::with_config("fast_transmit.toml");
    assert!(matches!(
        workspace.run(dry_run()),
        Err(AppError::NothingToSend)
    ));
    assert!(matches!(
        workspace.run(SubCommands::Payload(PayloadCmd {})),
        Err(AppError::NothingToSend)
    ));
}

#[test]
#[timeout(5000)]
fn dosage_holding_end_marker_is_not_sent() {
    let workspace = Workspace::with_config("fast_transmit.toml");
    workspace
        .run(SubCommands::Add(AddCmd {
            tube: "tube1".into(),
            name: "Aspirin".into(),
            amount: "30".into(),
            dose: vec!["08:00=take #END# now".into()],
        }))
        .unwrap();
    let result = workspace.run(dry_run());
    assert!(
        matches!(result, Err(AppError::Frame(FrameError::MarkerInBody(_)))),
        "{result:?}"
    );
}

#[test]
#[timeout(10000)]
fn dry_run_round_trips() {
    let workspace = Workspace::with_config("fast_transmit.toml");
    workspace.run(import("tests/fixtures/schedule.json")).unwrap();
    workspace.run(dry_run()).unwrap();
}

#[test]
#[timeout(5000)]
fn store_file_is_the_wire_json() {
    let workspace = Workspace::new();
    workspace.run(import("tests/fixtures/schedule.json")).unwrap();

    let json = std::fs::read_to_string(workspace.store_path()).unwrap();
    let framed = format!("#START#{json}#END#");
    let decoded = decode(framed.as_bytes(), &Markers::default()).unwrap();
    assert_eq!(decoded, workspace.stored());
}
