// SPDX-License-Identifier: MIT
//
// viemu: headless driver for the viemu-core Vi engine.
//
// Loads a file into an in-memory buffer, feeds it a keystroke script in
// key notation, and writes the result:
//
//   viemu --keys 'ggdGihello<Esc>:wq<CR>' notes.txt
//
// Each key flows through the same path a UI host would use:
//
//   script → parse_keys → Editor::feed → mapper → mode dispatch → buffer
//
// Status messages go to stderr as they appear; the final buffer goes to
// stdout (or --output). Ex `:w`/`:q` requests are honoured as they come.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use viemu_core::{Buffer, Editor, HostRequest, KeyEvent, Options, Session, parse_keys};

const USAGE: &str = "usage: viemu [--keys SCRIPT | --keys-file FILE] [--session FILE] [--options FILE] [--output FILE] [PATH]";

// ─── Arguments ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    keys: Option<String>,
    keys_file: Option<PathBuf>,
    session: Option<PathBuf>,
    options: Option<PathBuf>,
    output: Option<PathBuf>,
    path: Option<PathBuf>,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    while let Some(arg) = argv.next() {
        let mut value = |flag: &str| argv.next().with_context(|| format!("{flag} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--keys" => args.keys = Some(value("--keys")?),
            "--keys-file" => args.keys_file = Some(value("--keys-file")?.into()),
            "--session" => args.session = Some(value("--session")?.into()),
            "--options" => args.options = Some(value("--options")?.into()),
            "--output" => args.output = Some(value("--output")?.into()),
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            _ if args.path.is_none() => args.path = Some(PathBuf::from(&arg)),
            _ => bail!("only one file may be given\n{USAGE}"),
        }
    }
    if args.keys.is_some() && args.keys_file.is_some() {
        bail!("--keys and --keys-file are mutually exclusive");
    }
    Ok(args)
}

// ─── Driving ────────────────────────────────────────────────────────────────

/// Feed `keys`, honouring write/quit requests as they arrive. Stops early
/// on a quit. Returns every status message shown along the way.
fn drive(editor: &mut Editor, keys: &[KeyEvent]) -> anyhow::Result<Vec<String>> {
    let mut messages = Vec::new();
    for &key in keys {
        editor.feed(key);
        collect_status(editor, &mut messages);
        if handle_requests(editor, &mut messages)? {
            debug!("quit requested");
            return Ok(messages);
        }
    }
    if editor.pending_timeout().is_some() {
        editor.on_timeout();
        collect_status(editor, &mut messages);
        handle_requests(editor, &mut messages)?;
    }
    Ok(messages)
}

fn collect_status(editor: &Editor, messages: &mut Vec<String>) {
    if let Some(status) = editor.status()
        && messages.last().map(String::as_str) != Some(status.text())
    {
        messages.push(status.text().to_string());
    }
}

/// Returns `true` once the script asked to quit.
fn handle_requests(editor: &mut Editor, messages: &mut Vec<String>) -> anyhow::Result<bool> {
    for request in editor.take_requests() {
        match request {
            HostRequest::Write { path, quit } => {
                let buffer = editor.buffer_mut();
                let target = match path.or_else(|| buffer.path().map(Path::to_path_buf)) {
                    Some(target) => target,
                    None => {
                        messages.push("E32: No file name".to_string());
                        continue;
                    }
                };
                buffer
                    .save_as(&target)
                    .with_context(|| format!("writing {}", target.display()))?;
                info!(path = %target.display(), "written");
                messages.push(format!("\"{}\" written", target.display()));
                if quit {
                    return Ok(true);
                }
            }
            HostRequest::Quit { force } => {
                if !force && editor.buffer().is_modified() {
                    messages.push("E37: No write since last change (add ! to override)".to_string());
                    continue;
                }
                return Ok(true);
            }
        }
    }
    Ok(false)
}

// ─── Files ──────────────────────────────────────────────────────────────────

fn load_options(path: Option<&Path>) -> anyhow::Result<Options> {
    let Some(path) = path else { return Ok(Options::default()) };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing options in {}", path.display()))
}

fn load_store(path: Option<&Path>) -> anyhow::Result<BTreeMap<String, Value>> {
    let Some(path) = path else { return Ok(BTreeMap::new()) };
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).with_context(|| format!("parsing session {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(err).with_context(|| format!("reading session {}", path.display())),
    }
}

fn save_store(path: &Path, store: &BTreeMap<String, Value>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(store)?;
    fs::write(path, text).with_context(|| format!("writing session {}", path.display()))
}

fn new_session(options: Options) -> Session {
    #[cfg(feature = "clipboard")]
    let session = Session::with_clipboard(Box::new(viemu_core::host::SystemClipboard::new()));
    #[cfg(not(feature = "clipboard"))]
    let session = Session::new();
    session.with_options(options)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn run(args: Args) -> anyhow::Result<()> {
    let script = match (&args.keys, &args.keys_file) {
        (Some(keys), _) => keys.clone(),
        (None, Some(file)) => fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?,
        (None, None) => String::new(),
    };
    let buffer = match &args.path {
        Some(path) => Buffer::from_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => Buffer::new(),
    };

    let session = new_session(load_options(args.options.as_deref())?).into_shared();
    let mut editor = Editor::new(buffer, session);
    let mut store = load_store(args.session.as_deref())?;
    if let Err(err) = editor.load_state(&store) {
        warn!(%err, "session partly restored");
    }

    let keys = parse_keys(script.trim_end_matches(['\r', '\n']));
    debug!(keys = keys.len(), "running script");
    for message in drive(&mut editor, &keys)? {
        eprintln!("{message}");
    }

    if let Some(path) = &args.session {
        editor.save_state(&mut store);
        save_store(path, &store)?;
    }
    let text = editor.buffer().disk_text();
    match &args.output {
        Some(path) => fs::write(path, text).with_context(|| format!("writing {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("VIEMU_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let result = parse_args(env::args().skip(1)).and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("viemu: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        parse_args(list.iter().map(ToString::to_string))
    }

    fn editor(text: &str) -> Editor {
        Editor::from_text(text, Session::new().into_shared())
    }

    // ── Arguments ───────────────────────────────────────────────────────

    #[test]
    fn parses_flags_and_path() {
        let parsed = args(&["--keys", "dd", "--output", "out.txt", "in.txt"]).unwrap();
        assert_eq!(parsed.keys.as_deref(), Some("dd"));
        assert_eq!(parsed.output, Some(PathBuf::from("out.txt")));
        assert_eq!(parsed.path, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&["--keys"]).is_err());
        assert!(args(&["--frob"]).is_err());
        assert!(args(&["a", "b"]).is_err());
        assert!(args(&["--keys", "x", "--keys-file", "f"]).is_err());
    }

    // ── Driving ─────────────────────────────────────────────────────────

    #[test]
    fn drive_applies_keys_and_collects_status() {
        let mut ed = editor("a\nb\nc\nd");
        let messages = drive(&mut ed, &parse_keys("3dd")).unwrap();
        assert_eq!(ed.text(), "d");
        assert_eq!(messages, vec!["3 fewer lines".to_string()]);
    }

    #[test]
    fn drive_stops_on_quit() {
        let mut ed = editor("abc");
        drive(&mut ed, &parse_keys(":q!<CR>x")).unwrap();
        assert_eq!(ed.text(), "abc");
    }

    #[test]
    fn quit_refuses_unsaved_changes() {
        let mut ed = editor("abc");
        let messages = drive(&mut ed, &parse_keys("x:q<CR>x")).unwrap();
        assert_eq!(ed.text(), "c");
        assert!(messages.iter().any(|m| m.starts_with("E37")));
    }

    #[test]
    fn write_without_name_reports() {
        let mut ed = editor("abc");
        let messages = drive(&mut ed, &parse_keys(":w<CR>")).unwrap();
        assert_eq!(messages, vec!["E32: No file name".to_string()]);
    }

    #[test]
    fn drive_flushes_held_mapping() {
        let mut ed = editor("abc");
        ed.execute("map x dd");
        ed.execute("map xy l");
        drive(&mut ed, &parse_keys("x")).unwrap();
        assert_eq!(ed.text(), "");
    }
}
