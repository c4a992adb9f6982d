use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use isocreator_rs::tree::listing;
use isocreator_rs::{spawn_build, BuildEvent, BuildJob, BuildOptions, ProgressState};

const USAGE: &str = "usage:
  IsoCreator-rs folder <source-folder> [output.iso] [volume-name]
  IsoCreator-rs virtual <listing.txt> [output.iso] [volume-name]

Press Enter while the image is being written to cancel.";

const DEFAULT_OUTPUT: &str = "ISO.iso";
const DEFAULT_VOLUME: &str = "ISO";

/// Parsed command line.
struct Command {
    mode: String,
    input: PathBuf,
    output: PathBuf,
    volume_name: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let (Some(mode), Some(input)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let volume_name = args.next().unwrap_or_else(|| DEFAULT_VOLUME.to_string());
    if args.next().is_some() {
        bail!(USAGE);
    }
    Ok(Command {
        mode,
        input: PathBuf::from(input),
        output: PathBuf::from(output),
        volume_name,
    })
}

fn job_for(command: Command) -> Result<BuildJob> {
    match command.mode.as_str() {
        "folder" => Ok(BuildJob::Folder {
            source: command.input,
            output: command.output,
            volume_name: command.volume_name,
        }),
        "virtual" => {
            let text = std::fs::read_to_string(&command.input)
                .with_context(|| format!("failed to read listing {}", command.input.display()))?;
            let tree = listing::parse_listing(&text, &command.volume_name, Utc::now())
                .with_context(|| format!("failed to parse listing {}", command.input.display()))?;
            tracing::info!(
                "Virtual tree: {} directories, {} files",
                tree.directory_count(),
                tree.file_count()
            );
            Ok(BuildJob::Tree {
                tree,
                output: command.output,
            })
        }
        other => bail!("unknown mode '{}'\n\n{}", other, USAGE),
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("isocreator_rs=info".parse()?),
        )
        .init();

    let command = parse_args(std::env::args().skip(1))?;
    tracing::info!(
        "IsoCreator-rs starting: {} {} -> {}",
        command.mode,
        command.input.display(),
        command.output.display()
    );

    let job = job_for(command)?;
    let handle = spawn_build(job, BuildOptions::default()).context("failed to start build worker")?;

    // Enter on stdin cancels; EOF (no terminal attached) does not
    let cancel = handle.cancel_token();
    std::thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = io::stdin().lock().read_line(&mut line) {
            if n > 0 {
                cancel.cancel();
            }
        }
    });

    let mut state = ProgressState::default();
    let mut stderr = io::stderr();
    for event in handle.events.iter() {
        match event {
            BuildEvent::Progress(progress) => {
                state.apply(&progress);
                let _ = write!(
                    stderr,
                    "\r[{:>3}%] {}/{} {:<40.40}",
                    state.percent(),
                    state.current,
                    state.maximum,
                    state.action.as_deref().unwrap_or("")
                );
                let _ = stderr.flush();
            }
            BuildEvent::Abort(abort) => {
                let _ = writeln!(stderr, "\nAborted: {}", abort.message);
            }
            BuildEvent::Finish(finish) => {
                let _ = writeln!(stderr, "\n{}", finish.message);
            }
        }
    }

    let summary = handle.join()?;
    println!(
        "{} ({} sectors, {} directories, {} files)",
        summary.output.display(),
        summary.total_sectors,
        summary.directories,
        summary.files
    );
    Ok(())
}
