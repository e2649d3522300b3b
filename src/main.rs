// SPDX-License-Identifier: MIT
//
// n-modal — headless driver for the n-editor modal editing core.
//
// Opens a file (or an empty scratch buffer), feeds a key script through the
// session exactly as if it were typed, then prints the buffer:
//
//   n-modal notes.txt --keys 'gg3dd/TODO<CR>cwDONE<Esc>' --write
//
// Each key flows through:
//
//   --keys / --script → parse_keys → Session::feed_key → Editor → Buffer
//
// A failing key is reported on stderr and the script continues, the way an
// interactive editor beeps and carries on; --strict stops at the first one.
// --state carries undo trees, last positions and global marks between runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use n_editor::Session;
use n_editor::key::parse_keys;
use n_editor::persist::SessionState;

#[derive(Parser, Debug)]
#[command(name = "n-modal", version, about = "Feed Vim-style keys to a buffer and print the result")]
struct Cli {
    /// File to edit; an empty buffer if omitted.
    file: Option<PathBuf>,

    /// Keys in <Esc> notation, e.g. "dwjp" or "qaA;<Esc>jq3@a".
    #[arg(short, long, default_value = "")]
    keys: String,

    /// File with more keys, fed after --keys.
    #[arg(long)]
    script: Option<PathBuf>,

    /// `:set` directives ("ic scs", "nows", "regdepth=5"); may repeat.
    #[arg(short, long = "set")]
    set: Vec<String>,

    /// Write the buffer back to FILE.
    #[arg(short, long)]
    write: bool,

    /// Session state file, read at start and written at exit.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Stop at the first failing key.
    #[arg(long)]
    strict: bool,

    /// Also print mode and cursor.
    #[arg(long)]
    status: bool,

    /// Write debug logs to this file.
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log.as_deref())?;

    let mut session = Session::new();
    if let Some(path) = &cli.state {
        if path.exists() {
            let state = SessionState::load(path)
                .with_context(|| format!("reading session state {}", path.display()))?;
            session.import_state(state);
        }
    }
    if let Some(file) = &cli.file {
        session
            .open_file(file)
            .with_context(|| format!("opening {}", file.display()))?;
    }
    for directive in &cli.set {
        session
            .set_option(directive)
            .with_context(|| format!("set {directive}"))?;
    }

    let mut keys = cli.keys.clone();
    if let Some(script) = &cli.script {
        let text = fs::read_to_string(script)
            .with_context(|| format!("reading key script {}", script.display()))?;
        keys.push_str(text.trim_end_matches(['\n', '\r']));
    }

    let mut failures = 0usize;
    for key in parse_keys(&keys) {
        if let Err(err) = session.feed_key(key) {
            tracing::debug!(target: "n_modal", %key, error = %err, "key failed");
            if cli.strict {
                bail!("key {key}: {err}");
            }
            eprintln!("n-modal: {key}: {err}");
            failures += 1;
        }
    }

    if cli.write {
        let id = session.active();
        let editor = session.editor_mut(id).context("no active buffer")?;
        editor.write().context("writing buffer")?;
    }

    let state = session.shutdown();
    if let Some(path) = &cli.state {
        state
            .save(path)
            .with_context(|| format!("writing session state {}", path.display()))?;
    }

    let editor = session.current();
    println!("{}", editor.buffer().contents());
    if cli.status {
        println!("-- {} -- {}", editor.mode(), editor.cursor().position());
    }
    tracing::debug!(target: "n_modal", failures, "done");
    Ok(())
}

/// Console logging filtered by `RUST_LOG` (default `warn`), plus a debug
/// log file when `--log` is given. The guard flushes the file on drop.
fn init_tracing(log: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let (file, guard) = match log {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().context("--log needs a file name")?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_set_flags() {
        let cli = Cli::parse_from(["n-modal", "f.txt", "-s", "ic", "--set", "nows", "-k", "dd", "-w"]);
        assert_eq!(cli.file, Some(PathBuf::from("f.txt")));
        assert_eq!(cli.set, vec!["ic", "nows"]);
        assert_eq!(cli.keys, "dd");
        assert!(cli.write);
        assert!(!cli.strict);
    }

    #[test]
    fn defaults_to_scratch_buffer() {
        let cli = Cli::parse_from(["n-modal"]);
        assert!(cli.file.is_none());
        assert!(cli.keys.is_empty());
        assert!(cli.state.is_none());
    }
}
