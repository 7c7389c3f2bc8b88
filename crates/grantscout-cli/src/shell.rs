// Interactive line-based session
use anyhow::Result;
use grantscout_core::{
    display,
    session::should_submit,
    Config, GrantSearch, SearchMode, SearchSession,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{export_session, print_notice, FormatArg};

const HELP: &str = "\
Commands:
  :mode keywords|url   switch search mode
  :export [PATH]       save the results on screen (CSV unless PATH ends in .json)
  :help                show this help
  :quit                leave

Keyword mode: one search term per line, empty line to search.
URL mode: paste a URL and press Enter.";

#[derive(Debug, PartialEq)]
enum ShellCommand {
    Mode(SearchMode),
    Export(Option<PathBuf>),
    Help,
    Quit,
    Invalid(String),
}

/// `:`-prefixed lines are commands, everything else is search input
fn parse_command(line: &str) -> Option<ShellCommand> {
    let rest = line.trim().strip_prefix(':')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let command = match name {
        "mode" | "m" => match arg.map(str::parse::<SearchMode>) {
            Some(Ok(mode)) => ShellCommand::Mode(mode),
            Some(Err(e)) => ShellCommand::Invalid(e),
            None => ShellCommand::Invalid("usage: :mode keywords|url".to_string()),
        },
        "export" | "e" => ShellCommand::Export(arg.map(PathBuf::from)),
        "help" | "h" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Invalid(format!("unknown command ':{}' (try :help)", other)),
    };
    Some(command)
}

/// Collects input lines until the mode's submit rule fires
#[derive(Debug, Default)]
struct InputBuffer {
    lines: Vec<String>,
}

impl InputBuffer {
    /// Feed one line; returns the text to search when it's time to submit.
    /// In keyword mode an empty line plays the part of the modified Enter.
    fn feed(&mut self, mode: SearchMode, line: &str) -> Option<String> {
        let modifier = line.trim().is_empty();
        if !modifier {
            self.lines.push(line.to_string());
        }

        if should_submit(mode, modifier) {
            let query = self.lines.join("\n");
            self.lines.clear();
            Some(query)
        } else {
            None
        }
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

fn prompt(mode: SearchMode, pending: bool) {
    let marker = if pending { "..." } else { ">" };
    eprint!("[{}] {} ", mode, marker);
}

pub async fn run(search: &GrantSearch, config: &Config, mode: SearchMode) -> Result<()> {
    let mut session = SearchSession::new(mode);
    let mut buffer = InputBuffer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Quantilytix Grant Finder - :help for commands");
    prompt(session.mode(), false);

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Some(ShellCommand::Quit) => break,
            Some(ShellCommand::Help) => eprintln!("{}", HELP),
            Some(ShellCommand::Mode(mode)) => {
                session.set_mode(mode);
                buffer.clear();
                eprintln!("Searching by {} now.", mode);
            }
            Some(ShellCommand::Export(path)) => {
                let format = path
                    .as_deref()
                    .and_then(|p| p.extension())
                    .and_then(|e| e.to_str())
                    .and_then(FormatArg::from_extension);
                if let Err(e) = export_session(&session, config, path, format) {
                    eprintln!("Export failed: {:#}", e);
                }
            }
            Some(ShellCommand::Invalid(msg)) => eprintln!("{}", msg),
            None => {
                if let Some(query) = buffer.feed(session.mode(), &line) {
                    eprintln!("Searching grants...");
                    let notice = session.submit(search, &query).await;
                    if !session.results().is_empty() {
                        println!("{}", display::render_results(session.results()));
                    }
                    if let Some(notice) = notice {
                        print_notice(&notice);
                    }
                }
            }
        }

        prompt(session.mode(), !buffer.lines.is_empty());
    }

    eprintln!();
    Ok(())
}
