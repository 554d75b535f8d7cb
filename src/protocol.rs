//! Purpose: Marshal host command records and replies as JSON.
//! Exports: `CommandRecord`, `WireArg`, `parse_command`, `reply_json`, `envelope`, `handle_line`.
//! Role: Host boundary adapter shared by the stdio binary and the C ABI.
//! Invariants: Handles travel as `{"handle": <u64>}` and are never reinterpreted here.
//! Invariants: Every input line yields exactly one envelope; malformed input is `InvalidArgument`.
//! Invariants: Envelope shape is `{ok, value}` or `{ok, errorKind, message}`; fields are additive-only.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::error::{Error, ErrorKind};
use crate::core::handle::Handle;
use crate::core::raw::RawArray;
use crate::dispatch::{Arg, Bridge, Reply};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub verb: String,
    #[serde(default)]
    pub args: Vec<WireArg>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireArg {
    Handle { handle: u64 },
    Scalar(f64),
    Array(RawArray),
    Text(String),
}

impl From<WireArg> for Arg {
    fn from(arg: WireArg) -> Self {
        match arg {
            WireArg::Handle { handle } => Arg::Handle(Handle::from_raw(handle)),
            WireArg::Scalar(value) => Arg::Scalar(value),
            WireArg::Array(array) => Arg::Array(array),
            WireArg::Text(text) => Arg::Text(text),
        }
    }
}

pub fn parse_command(bytes: &[u8]) -> Result<(String, Vec<Arg>), Error> {
    let text = std::str::from_utf8(bytes).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("command is not valid UTF-8")
            .with_source(err)
    })?;
    let record: CommandRecord = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("invalid command record: {err}"))
            .with_source(err)
    })?;
    let args = record.args.into_iter().map(Arg::from).collect();
    Ok((record.verb, args))
}

pub fn reply_json(reply: &Reply) -> Value {
    match reply {
        Reply::Handle(handle) => json!({ "handle": handle.into_raw() }),
        Reply::Pair(pair) => json!({
            "re": number_json(pair.re),
            "im": pair.im.map(number_json),
        }),
        Reply::Text(text) => json!(text),
        Reply::Bool(flag) => json!(flag),
        Reply::Count(count) => json!(count),
        Reply::None => Value::Null,
    }
}

/// JSON has no non-finite numbers; they travel as `"Infinity"`, `"-Infinity"` or `"NaN"`.
fn number_json(value: f64) -> Value {
    if value.is_nan() {
        json!("NaN")
    } else if value.is_infinite() {
        json!(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        json!(value)
    }
}

pub fn error_json(err: &Error) -> Value {
    let mut map = Map::new();
    map.insert("ok".to_string(), json!(false));
    map.insert("errorKind".to_string(), json!(err.kind().as_str()));
    map.insert(
        "message".to_string(),
        json!(err.message().unwrap_or(err.kind().as_str())),
    );
    if let Some(handle) = err.handle() {
        map.insert("handle".to_string(), json!(handle));
    }
    Value::Object(map)
}

pub fn envelope(result: &Result<Reply, Error>) -> Value {
    match result {
        Ok(reply) => json!({ "ok": true, "value": reply_json(reply) }),
        Err(err) => error_json(err),
    }
}

/// Runs one serialized command record against `bridge` and returns its envelope.
pub fn handle_line(bridge: &mut Bridge, line: &[u8]) -> Value {
    let result = parse_command(line).and_then(|(verb, args)| bridge.call(&verb, &args));
    envelope(&result)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{handle_line, parse_command};
    use crate::core::raw::RawArray;
    use crate::dispatch::{Arg, Bridge};

    fn run(bridge: &mut Bridge, command: Value) -> Value {
        handle_line(bridge, command.to_string().as_bytes())
    }

    fn handle_of(reply: &Value) -> u64 {
        reply["value"]["handle"].as_u64().expect("handle value")
    }

    #[test]
    fn wire_args_decode_by_shape() {
        let line = br#"{"verb":"x","args":[{"handle":18446744073709551615},2.5,{"dims":[1,1],"re":[1.0]},"hi"]}"#;
        let (verb, args) = parse_command(line).expect("parse");
        assert_eq!(verb, "x");
        assert_eq!(
            args,
            vec![
                Arg::Handle(crate::core::handle::Handle::from_raw(u64::MAX)),
                Arg::Scalar(2.5),
                Arg::Array(RawArray::scalar(1.0, None)),
                Arg::Text("hi".to_string()),
            ]
        );
    }

    #[test]
    fn missing_args_default_to_empty() {
        let (verb, args) = parse_command(br#"{"verb":"new"}"#).expect("parse");
        assert_eq!(verb, "new");
        assert!(args.is_empty());
    }

    #[test]
    fn scenario_over_json() {
        let mut bridge = Bridge::default();
        let a = run(&mut bridge, json!({ "verb": "new" }));
        assert_eq!(a["ok"], true);
        let b = run(
            &mut bridge,
            json!({ "verb": "newFromMatlab", "args": [{ "dims": [1, 1], "re": [5.0], "im": [2.0] }] }),
        );
        let c = run(
            &mut bridge,
            json!({ "verb": "plus", "args": [{ "handle": handle_of(&a) }, { "handle": handle_of(&b) }] }),
        );
        let pair = run(
            &mut bridge,
            json!({ "verb": "double", "args": [{ "handle": handle_of(&c) }] }),
        );
        assert_eq!(pair, json!({ "ok": true, "value": { "re": 5.0, "im": 2.0 } }));

        let deleted = run(
            &mut bridge,
            json!({ "verb": "delete", "args": [{ "handle": handle_of(&a) }] }),
        );
        assert_eq!(deleted, json!({ "ok": true, "value": null }));
        let valid_a = run(
            &mut bridge,
            json!({ "verb": "isValid", "args": [{ "handle": handle_of(&a) }] }),
        );
        assert_eq!(valid_a["value"], false);
        let valid_b = run(
            &mut bridge,
            json!({ "verb": "isValid", "args": [{ "handle": handle_of(&b) }] }),
        );
        assert_eq!(valid_b["value"], true);
    }

    #[test]
    fn failures_carry_kind_and_message() {
        let mut bridge = Bridge::default();
        let reply = run(&mut bridge, json!({ "verb": "frobnicate", "args": [1, 2] }));
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["errorKind"], "UnrecognizedCommand");
        assert!(reply["message"].as_str().unwrap().contains("frobnicate"));

        let reply = run(
            &mut bridge,
            json!({ "verb": "display", "args": [{ "handle": 281474976710657u64 }] }),
        );
        assert_eq!(reply["errorKind"], "InvalidHandle");
        assert_eq!(reply["handle"], 281474976710657u64);
    }

    #[test]
    fn malformed_lines_are_invalid_argument() {
        let mut bridge = Bridge::default();
        let lines: [&[u8]; 4] = [
            b"not json",
            b"{\"args\":[]}",
            b"\xff",
            b"{\"verb\":\"new\",\"args\":[null]}",
        ];
        for line in lines {
            let reply = handle_line(&mut bridge, line);
            assert_eq!(reply["errorKind"], "InvalidArgument");
        }
        assert!(bridge.registry().is_empty());
    }

    #[test]
    fn oversized_dims_get_an_envelope() {
        let mut bridge = Bridge::default();
        let line = br#"{"verb":"newFromMatlab","args":[{"dims":[4294967296,4294967296],"re":[]}]}"#;
        let reply = handle_line(&mut bridge, line);
        assert_eq!(reply["ok"], false);
        assert_eq!(reply["errorKind"], "InvalidArgument");
        assert!(bridge.registry().is_empty());
    }

    #[test]
    fn non_finite_parts_export_as_strings() {
        let mut bridge = Bridge::default();
        let h = run(&mut bridge, json!({ "verb": "newFromMatlab", "args": [1e308] }));
        let sum = run(
            &mut bridge,
            json!({ "verb": "plus", "args": [{ "handle": handle_of(&h) }, { "handle": handle_of(&h) }] }),
        );
        let pair = run(
            &mut bridge,
            json!({ "verb": "double", "args": [{ "handle": handle_of(&sum) }] }),
        );
        assert_eq!(pair, json!({ "ok": true, "value": { "re": "Infinity", "im": null } }));

        let h = run(
            &mut bridge,
            json!({ "verb": "newFromMatlab", "args": [{ "dims": [1, 1], "re": [-1e308], "im": [2.0] }] }),
        );
        let sum = run(
            &mut bridge,
            json!({ "verb": "plus", "args": [{ "handle": handle_of(&h) }, { "handle": handle_of(&h) }] }),
        );
        let pair = run(
            &mut bridge,
            json!({ "verb": "double", "args": [{ "handle": handle_of(&sum) }] }),
        );
        assert_eq!(pair["value"], json!({ "re": "-Infinity", "im": 4.0 }));
    }
}
