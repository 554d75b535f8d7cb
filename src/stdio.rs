//! Purpose: Host the command protocol over stdio.
//! Exports: `serve`.
//! Role: Bridge newline-delimited command records to a `Bridge` owned for the process lifetime.
//! Invariants: stdout only emits envelopes (one JSON value per input line).
//! Invariants: stdin EOF tears the registry down; leaks become a notice or a `Leaked` error.
//! Invariants: Malformed lines produce `InvalidArgument` envelopes and processing continues.

use std::io::{self, BufRead, BufReader, BufWriter, Write};

use handlebridge::core::error::{Error, ErrorKind};
use handlebridge::core::registry::TeardownReport;
use handlebridge::dispatch::{Bridge, BridgeConfig};
use handlebridge::protocol::handle_line;
use serde_json::Value;

pub(super) fn serve(config: BridgeConfig) -> Result<TeardownReport, Error> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());
    let mut bridge = Bridge::new(config);
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read command")
                .with_source(err)
        })?;
        if read == 0 {
            writer.flush().map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to flush replies")
                    .with_source(err)
            })?;
            return bridge.teardown();
        }

        let message = line.trim_end_matches(['\n', '\r']);
        if message.trim().is_empty() {
            continue;
        }

        let reply = handle_line(&mut bridge, message.as_bytes());
        write_json_line(&mut writer, &reply)?;
    }
}

fn write_json_line(
    writer: &mut BufWriter<io::StdoutLock<'_>>,
    payload: &Value,
) -> Result<(), Error> {
    serde_json::to_writer(&mut *writer, payload).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode reply")
            .with_source(err)
    })?;
    writer.write_all(b"\n").map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write reply")
            .with_source(err)
    })?;
    writer.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush reply")
            .with_source(err)
    })
}
