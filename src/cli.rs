use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the `gofile` uploader.
#[derive(Parser, Debug)]
#[command(name = "gofile", version, about = "Upload files and folders to Gofile", long_about = None)]
pub struct Args {
    /// Upload multiple files to the same folder. All files will share the
    /// same URL. Requires a valid token exported as `GOFILE_TOKEN`
    #[arg(short = 's', long)]
    pub to_single_folder: bool,

    /// ID of an existing Gofile folder into which to upload files
    #[arg(short = 'f', long)]
    pub folder_id: Option<String>,

    /// Open the URL(s) in the browser when the upload is complete
    #[arg(short = 'o', long)]
    pub open_urls: bool,

    /// Export upload response(s) to a JSON file
    #[arg(short = 'e', long)]
    pub export: bool,

    /// Show more information
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Path to the file(s) and/or folder(s)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}
