// CLI integration tests for the stdio command protocol.
use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::{Value, json};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_handlebridge");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn run_stdio(extra: &[&str], lines: &[Value]) -> Output {
    let mut child = cmd()
        .arg("stdio")
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    {
        let mut stdin = child.stdin.take().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write command");
        }
    }
    child.wait_with_output().expect("wait")
}

fn replies(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(parse_json)
        .collect()
}

#[test]
fn stdio_replies_in_order_and_reports_leaks() {
    // Handles are minted sequentially from 1 under the Complex tag.
    let tag = 0x0C01u64 << 48;
    let (a, b, c) = (tag | 1, tag | 2, tag | 3);
    let output = run_stdio(
        &[],
        &[
            json!({ "verb": "new" }),
            json!({ "verb": "newFromMatlab", "args": [{ "dims": [1, 1], "re": [5.0], "im": [2.0] }] }),
            json!({ "verb": "plus", "args": [{ "handle": a }, { "handle": b }] }),
            json!({ "verb": "display", "args": [{ "handle": c }] }),
            json!({ "verb": "delete", "args": [{ "handle": a }] }),
            json!({ "verb": "isValid", "args": [{ "handle": a }] }),
            json!({ "verb": "isValid", "args": [{ "handle": b }] }),
            json!({ "verb": "frobnicate", "args": [{ "handle": b }] }),
        ],
    );
    assert!(output.status.success());

    let replies = replies(&output);
    assert_eq!(replies.len(), 8);
    assert_eq!(replies[0], json!({ "ok": true, "value": { "handle": a } }));
    assert_eq!(replies[1], json!({ "ok": true, "value": { "handle": b } }));
    assert_eq!(replies[2], json!({ "ok": true, "value": { "handle": c } }));
    assert_eq!(replies[3]["value"], "5.000000 + 2.000000i");
    assert_eq!(replies[4]["ok"], true);
    assert_eq!(replies[5]["value"], false);
    assert_eq!(replies[6]["value"], true);
    assert_eq!(replies[7]["ok"], false);
    assert_eq!(replies[7]["errorKind"], "UnrecognizedCommand");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let notice = stderr
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find(|value| value.get("notice").is_some())
        .expect("leak notice");
    assert_eq!(notice["notice"]["kind"], "leak");
    assert_eq!(notice["notice"]["details"]["released_count"], 2);
}

#[test]
fn stdio_survives_malformed_lines() {
    let mut child = cmd()
        .arg("stdio")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    {
        let mut stdin = child.stdin.take().expect("stdin");
        stdin
            .write_all(b"not json\n\n{\"verb\":\"count\"}\n")
            .expect("write");
    }
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());

    let replies = replies(&output);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["errorKind"], "InvalidArgument");
    assert_eq!(replies[1], json!({ "ok": true, "value": 0 }));
}

#[test]
fn require_empty_fails_on_leaked_handles() {
    let output = run_stdio(&["--require-empty"], &[json!({ "verb": "new" })]);
    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err = stderr
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .find(|value| value.get("error").is_some())
        .expect("error json");
    assert_eq!(err["error"]["kind"], "Leaked");
}

#[test]
fn require_empty_passes_when_everything_is_deleted() {
    let handle = (0x0C01u64 << 48) | 1;
    let output = run_stdio(
        &["--require-empty"],
        &[
            json!({ "verb": "newFromMatlab", "args": [3.0] }),
            json!({ "verb": "double", "args": [{ "handle": handle }] }),
            json!({ "verb": "delete", "args": [{ "handle": handle }] }),
        ],
    );
    assert!(output.status.success());
    let replies = replies(&output);
    assert_eq!(replies[1], json!({ "ok": true, "value": { "re": 3.0, "im": null } }));
}

#[test]
fn verbs_lists_table() {
    let output = cmd().arg("verbs").output().expect("verbs");
    assert!(output.status.success());
    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    let verbs = value["verbs"].as_array().expect("verbs array");
    let plus = verbs
        .iter()
        .find(|verb| verb["verb"] == "plus")
        .expect("plus entry");
    assert_eq!(plus["min_args"], 2);
    assert_eq!(plus["max_args"], 2);
    assert!(verbs.iter().any(|verb| verb["verb"] == "newFromMatlab"));
}

#[test]
fn unknown_subcommand_is_invalid_argument() {
    let output = cmd().arg("frobnicate").output().expect("run");
    assert_eq!(output.status.code(), Some(6));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err = parse_json(stderr.lines().last().expect("stderr line"));
    assert_eq!(err["error"]["kind"], "InvalidArgument");
}
