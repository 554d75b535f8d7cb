//! Purpose: Hold top-level CLI command dispatch for `handlebridge`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Leaked handles at stdio EOF become a stderr notice unless `--require-empty`.

use super::*;

use handlebridge::core::registry::TeardownPolicy;
use handlebridge::dispatch::{BridgeConfig, VERBS};
use handlebridge::notice::{leak_notice, notice_json, notice_time_now};

use clap::CommandFactory;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "handlebridge", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(json!({
                "name": "handlebridge",
                "version": env!("CARGO_PKG_VERSION"),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Verbs => {
            let verbs = VERBS
                .iter()
                .map(|spec| {
                    json!({
                        "verb": spec.name,
                        "min_args": spec.min_args,
                        "max_args": spec.max_args,
                    })
                })
                .collect::<Vec<_>>();
            emit_json(json!({ "verbs": verbs }));
            Ok(RunOutcome::ok())
        }
        Command::Stdio { require_empty } => {
            let teardown = if require_empty {
                TeardownPolicy::RequireEmpty
            } else {
                TeardownPolicy::ReleaseAll
            };
            let report = stdio::serve(BridgeConfig { teardown })?;
            if report.released > 0 {
                let time = notice_time_now().unwrap_or_default();
                let notice = leak_notice("stdio", time, &report);
                let json = serde_json::to_string(&notice_json(&notice)).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode notice")
                        .with_source(err)
                })?;
                eprintln!("{json}");
            }
            Ok(RunOutcome::ok())
        }
    }
}
