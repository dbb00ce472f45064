use clap::Parser;
use std::error::Error;

use facelab::cli::{self, Args, Command, CommonArgs};
use facelab::config::Config;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Build a session, play the script and report how it went.
async fn capture(config: &Config, common: &CommonArgs, script: cli::Script) -> Result<(), Box<dyn Error>> {
    let mut session = cli::build_session(config, common)?;
    let summary = cli::run_script(&mut session, script).await?;
    log::info!(
        "{} gestures, {} full frames, {} light frames",
        summary.gestures,
        summary.full_frames,
        summary.light_frames
    );
    if summary.interrupted {
        eprintln!("Interrupted.");
    } else if session.pending().is_some() {
        // the save did not go through; the capture is still pending
        return Err("capture was not saved".into());
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Snap { common } => {
            let script = cli::snap_script(&common)?;
            capture(&config, &common, script).await
        }
        Command::Clip { common, seconds } => {
            let script = cli::clip_script(&common, seconds, config.timings().long_press_ms)?;
            capture(&config, &common, script).await
        }
        Command::Formats => {
            cli::list_formats();
            Ok(())
        }
        Command::Phrases => {
            cli::print_phrases(&config);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
