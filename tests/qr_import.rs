use meds_dispenser::args::{AddCmd, QrCmd, SubCommands};
use meds_dispenser::medication::Schedule;

use ntest::timeout;

use common::Workspace;
mod common;

fn qr(codes: Vec<std::path::PathBuf>, check: bool) -> SubCommands {
    SubCommands::Qr(QrCmd { codes, check })
}

#[test]
#[timeout(5000)]
fn valid_lines_become_numbered_tubes() {
    let workspace = Workspace::new();
    workspace
        .run(qr(vec!["tests/fixtures/prescription_qr.txt".into()], false))
        .unwrap();

    let stored = workspace.stored();
    let summary: Vec<_> = stored
        .iter()
        .map(|m| (m.tube.as_str(), m.name.as_str(), m.amount))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Tube 1", "Aspirin", 30),
            ("Tube 2", "Metformin", 60),
            ("Tube 3", "Vitamin D", 90),
        ]
    );
    assert_eq!(
        stored[0].schedules,
        vec![
            Schedule::new("08:00", "1 tablet"),
            Schedule::new("20:00", "1 tablet")
        ]
    );
    assert_eq!(
        stored[1].schedules,
        vec![
            Schedule::new("7:30", "2 tablets"),
            Schedule::new("12:30", "1 tablet"),
            Schedule::new("19:30", "2 tablets"),
        ]
    );
}

#[test]
#[timeout(5000)]
fn codes_from_several_files_share_one_counter() {
    let workspace = Workspace::new();
    let first = workspace.write("first.txt", "Aspirin|30|08:00|1 tablet\n");
    let second = workspace.write("second.txt", "Ibuprofen|10|12:00|1 tablet\nnot a medication\n");
    workspace.run(qr(vec![first, second], false)).unwrap();

    let tubes: Vec<_> = workspace.stored().into_iter().map(|m| m.tube).collect();
    assert_eq!(tubes, vec!["Tube 1", "Tube 2"]);
}

#[test]
#[timeout(5000)]
fn rescanning_replaces_same_tubes() {
    let workspace = Workspace::new();
    workspace
        .run(SubCommands::Add(AddCmd {
            tube: "tube4".into(),
            name: "Insulin".into(),
            amount: "5".into(),
            dose: vec!["06:00=1 unit".into()],
        }))
        .unwrap();
    let code = workspace.write("code.txt", "Aspirin|30|08:00|1 tablet");
    workspace.run(qr(vec![code.clone()], false)).unwrap();
    workspace.run(qr(vec![code], false)).unwrap();

    let stored = workspace.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].tube, "tube4");
    assert_eq!(stored[1].tube, "Tube 1");
}

#[test]
#[timeout(5000)]
fn check_leaves_list_alone() {
    let workspace = Workspace::new();
    workspace
        .run(qr(vec!["tests/fixtures/prescription_qr.txt".into()], true))
        .unwrap();
    assert!(workspace.stored().is_empty());
}

#[test]
#[timeout(5000)]
fn paired_grammar_from_config() {
    let workspace = Workspace::with_config("paired_grammar.toml");
    let code = workspace.write(
        "code.txt",
        "Aspirin|30|08:00\nMetformin|60|07:30|2 tablets|19:30\nIbuprofen|10|12:00|1|18:00|2",
    );
    workspace.run(qr(vec![code], false)).unwrap();

    let stored = workspace.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].schedules, vec![Schedule::new("08:00", "1 capsule")]);
    assert_eq!(stored[1].name, "Ibuprofen");
    assert_eq!(stored[1].tube, "Tube 2");
}

#[test_log::test]
fn missing_code_file_is_an_error() {
    let workspace = Workspace::new();
    let result = workspace.run(qr(vec![workspace.dir.path().join("nope.txt")], false));
    assert!(result.is_err());
}
