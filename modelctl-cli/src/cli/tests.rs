use super::*;
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_import() {
    match parse(&["modelctl", "import", "sdxl/base:fp16"]) {
        CliCommand::Import {
            source,
            token,
            inplace,
            wait,
            timeout_secs,
        } => {
            assert_eq!(source, "sdxl/base:fp16");
            assert!(token.is_none());
            assert!(!inplace);
            assert!(!wait);
            assert!(timeout_secs.is_none());
        }
        _ => panic!("expected Import"),
    }
}

#[test]
fn cli_parse_import_with_flags() {
    match parse(&[
        "modelctl",
        "import",
        "/local/model.safetensors",
        "--inplace",
        "--wait",
        "--timeout-secs",
        "30",
    ]) {
        CliCommand::Import {
            inplace,
            wait,
            timeout_secs,
            ..
        } => {
            assert!(inplace);
            assert!(wait);
            assert_eq!(timeout_secs, Some(30));
        }
        _ => panic!("expected Import"),
    }
}

#[test]
fn cli_parse_list() {
    match parse(&["modelctl", "list"]) {
        CliCommand::List => {}
        _ => panic!("expected List"),
    }
}

#[test]
fn cli_parse_status() {
    match parse(&["modelctl", "status", "7"]) {
        CliCommand::Status { id } => assert_eq!(id, 7),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["modelctl", "cancel", "3"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 3),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_prune() {
    match parse(&["modelctl", "prune"]) {
        CliCommand::Prune => {}
        _ => panic!("expected Prune"),
    }
}

#[test]
fn cli_parse_delete() {
    match parse(&["modelctl", "delete", "sdxl/base"]) {
        CliCommand::Delete { key, force } => {
            assert_eq!(key, "sdxl/base");
            assert!(!force);
        }
        _ => panic!("expected Delete"),
    }
}

#[test]
fn cli_parse_delete_force() {
    match parse(&["modelctl", "delete", "sdxl/base", "--force"]) {
        CliCommand::Delete { force, .. } => assert!(force),
        _ => panic!("expected Delete"),
    }
}
