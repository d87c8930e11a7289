// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, source the token,
//   then hand over to `upload::run`.
// - Any upload error is rendered once here and turns into exit status 1.

use anyhow::{Context, Result};
use clap::Parser;
use gofile_upload::api::ApiClient;
use gofile_upload::cli::Args;
use gofile_upload::config::Settings;
use gofile_upload::ui::{self, Terminal};
use gofile_upload::{upload, UploadError, UploadOptions};
use log::{debug, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    initialize_logging(args.verbose)?;

    let settings = Settings::load();
    debug!("Upload token {}", if settings.token.is_some() { "found" } else { "not set" });

    let options = UploadOptions {
        paths: args.paths,
        to_single_folder: args.to_single_folder,
        verbose: args.verbose,
        export: args.export,
        open_urls: args.open_urls,
        folder_id: args.folder_id,
        token: settings.token,
        export_dir: std::env::current_dir().context("Failed to read current directory")?,
    };

    match upload_all(&options) {
        Ok(urls) => {
            debug!("{} upload(s) completed", urls.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            ui::report_fatal(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn upload_all(options: &UploadOptions) -> Result<Vec<String>, UploadError> {
    let api = ApiClient::new()?;
    let mut terminal = Terminal::new();
    upload::run(&api, &mut terminal, options)
}

/// Log to stderr so stdout only carries the result panels.
fn initialize_logging(verbose: bool) -> Result<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}
