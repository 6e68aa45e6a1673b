//! End-to-end tests driving the weftc binary over input files.

use std::path::PathBuf;
use std::process::{Command, Output};

fn weftc() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_weftc"))
}

/// Writes `input` to a temp file and runs weftc over it with `args`.
fn run_weftc(args: &[&str], input: &str) -> Output {
    let dir = tempfile::tempdir().expect("create temp dir");
    let in_path = dir.path().join("input.wft");
    std::fs::write(&in_path, input).expect("write input");

    Command::new(weftc())
        .args(args)
        .arg(&in_path)
        .output()
        .expect("weftc runs")
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn resolves_and_prints_cost_and_type() {
    let out = run_weftc(&[], "1 f 2\n%%\nf( 1 )\n");
    assert!(out.status.success());
    let text = stdout_of(&out);
    assert!(
        text.contains("[1 / (0,0,0,0,1)] f( 1 => 2 )"),
        "unexpected output: {text}"
    );
}

#[test]
fn reports_ambiguous_resolutions() {
    let out = run_weftc(&[], "2 f 1\n3 f 1\n%%\nf( 1 )\n");
    assert!(out.status.success());
    let text = stdout_of(&out);
    assert!(text.contains("ERROR: ambiguous resolution for f( 1 )"));
    assert!(text.contains("candidates are:"));
}

#[test]
fn reports_invalid_and_unbound() {
    let out = run_weftc(&[], "2 f 1\n%%\ng( 1 )\n");
    assert!(stdout_of(&out).contains("ERROR: no valid resolution for g( 1 )"));

    let out = run_weftc(&[], "T f\n%%\nf( )\n");
    assert!(stdout_of(&out).contains("ERROR: unbound type variables in f( )"));
}

#[test]
fn filters_print_input_forms() {
    let input = "2 f 1\n3 f 1\n4 g 4\n%%\nf( 1 )\ng( 4 )\nh( 1 )\n";

    // `invalid` keeps only the unique resolutions
    let out = run_weftc(&["--filter", "invalid"], input);
    assert_eq!(stdout_of(&out), "g( 4 )\n");

    // `unambiguous` keeps only the ambiguous ones
    let out = run_weftc(&["--filter", "unambiguous"], input);
    assert_eq!(stdout_of(&out), "f( 1 )\n");

    // `resolvable` keeps only the dead expression
    let out = run_weftc(&["--filter", "resolvable"], input);
    assert_eq!(stdout_of(&out), "h( 1 )\n");
}

#[test]
fn quiet_suppresses_output_and_bench_appends_csv() {
    let out = run_weftc(&["--quiet", "--bench"], "2 f 1\n%%\nf( 1 )\n");
    assert!(out.status.success());
    let text = stdout_of(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1, "quiet output is the CSV line only: {text}");
    let fields: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(fields[0], "1");
    assert_eq!(fields[1], "1");
    assert!(fields[2].parse::<u64>().is_ok());
}

#[test]
fn verbose_echoes_input() {
    let input = "2 f 1\n%%\nf( 1 )\n";
    let out = run_weftc(&["--verbose"], input);
    let text = stdout_of(&out);
    assert!(text.starts_with(input));
    assert!(text.contains("[2 / (0,0,0,0,0)]"));
}

#[test]
fn test_mode_is_deterministic_across_directions() {
    let input = "2 f 1\n1 g 2\n%%\ng( f( 1 ) )\nf( 1 )\n";
    let td = run_weftc(&["--test", "--dir", "td"], input);
    let bu = run_weftc(&["--test", "--dir", "bu"], input);
    assert!(td.status.success() && bu.status.success());
    assert_eq!(stdout_of(&td), stdout_of(&bu));
    assert!(stdout_of(&td).contains("[1 / (0,0,0,0,0)] g( f( 1 ) )"));
}

#[test]
fn parse_failure_exits_nonzero_with_line_number() {
    let out = run_weftc(&[], "2 f 1\nnot a decl !\n%%\nf( 1 )\n");
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("Invalid declaration [2]"), "stderr: {err}");
}

#[test]
fn output_file_receives_results() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let in_path = dir.path().join("in.wft");
    let out_path = dir.path().join("out.txt");
    std::fs::write(&in_path, "2 f 1\n%%\nf( 1 )\n").expect("write input");

    let status = Command::new(weftc())
        .arg(&in_path)
        .arg(&out_path)
        .status()
        .expect("weftc runs");
    assert!(status.success());

    let written = std::fs::read_to_string(&out_path).expect("output written");
    assert!(written.contains("[2 / (0,0,0,0,0)] f( 1 )"));
}
