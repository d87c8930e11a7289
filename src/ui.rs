// UI layer: renders a run in the terminal. Progress bars come from
// `indicatif`, colors from `crossterm`. Panels are drawn as rounded
// boxes around their lines.

use crate::api::ProgressSink;
use crate::error::UploadError;
use crate::upload::{Reporter, UploadRecord, UploadTarget};
use crossterm::style::{StyledContent, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

const PROFILE_URL: &str = "https://gofile.io/myProfile";

impl ProgressSink for ProgressBar {
    fn bytes_sent(&self, total: u64) {
        self.set_position(total);
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .map(|style| style.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// One panel line made of styled segments.
type Line = Vec<StyledContent<String>>;

/// Draw `lines` inside a box sized to the widest line.
pub fn render_panel(lines: &[Line]) -> String {
    let widths: Vec<usize> = lines
        .iter()
        .map(|line| line.iter().map(|seg| seg.content().chars().count()).sum())
        .collect();
    let width = widths.iter().copied().max().unwrap_or(0);

    let mut out = format!("╭{}╮\n", "─".repeat(width + 2));
    for (line, w) in lines.iter().zip(widths) {
        out.push_str("│ ");
        for seg in line {
            out.push_str(&seg.to_string());
        }
        out.push_str(&" ".repeat(width - w));
        out.push_str(" │\n");
    }
    out.push_str(&format!("╰{}╯", "─".repeat(width + 2)));
    out
}

fn label(text: &str) -> StyledContent<String> {
    text.to_string().yellow()
}

fn path_text(path: &Path) -> StyledContent<String> {
    path.display().to_string().blue()
}

fn url_text(url: &str) -> StyledContent<String> {
    url.to_string().blue().underlined()
}

/// Reporter that writes to the terminal. Panels go to stdout, errors to
/// stderr.
#[derive(Default)]
pub struct Terminal {
    current: Option<ProgressBar>,
}

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for Terminal {
    fn missing_path(&mut self, path: &Path) {
        eprintln!(
            "{} {} {}",
            "ERROR:".red(),
            format!("\"{}\"", path.display()).blue().dim(),
            "does not exist!".red()
        );
    }

    fn upload_started(&mut self, target: &UploadTarget) -> Box<dyn ProgressSink> {
        println!("Uploading {}:", target.file_name());
        let bar = ProgressBar::new(target.size);
        bar.set_style(bar_style());
        bar.set_message("Progress...");
        self.current = Some(bar.clone());
        Box::new(bar)
    }

    fn upload_finished(&mut self, target: &UploadTarget) {
        if let Some(bar) = self.current.take() {
            bar.finish();
        }
        println!("Upload complete: {}", target.file_name());
    }

    fn upload_failed(&mut self, target: &UploadTarget, error: &UploadError) {
        if let Some(bar) = self.current.take() {
            bar.abandon();
        }
        debug!("Upload of {} failed: {:?}", target.path.display(), error);
    }

    fn record(&mut self, record: &UploadRecord) {
        match serde_json::to_string_pretty(record) {
            Ok(json) => {
                let lines: Vec<Line> = json.lines().map(|l| vec![l.to_string().stylize()]).collect();
                println!("{}", render_panel(&lines));
            }
            Err(e) => warn!("Could not render record for {}: {}", record.file.display(), e),
        }
    }

    fn file_uploaded(&mut self, file: &Path, url: &str) {
        let lines = vec![
            vec![label("File: "), path_text(file)],
            vec![label("Download page: "), url_text(url)],
        ];
        println!("{}", render_panel(&lines));
    }

    fn folder_summary(&mut self, files: &[PathBuf], url: &str) {
        let mut lines = vec![vec![label("Files:")]];
        lines.extend(files.iter().map(|f| vec![path_text(f)]));
        lines.push(vec![label("Download page: "), url_text(url)]);
        println!("{}", render_panel(&lines));
    }

    fn exported(&mut self, path: &Path) {
        println!(
            "{} {}",
            "Exported data to:".green(),
            path.display().to_string().magenta()
        );
    }

    fn open_url(&mut self, url: &str) {
        if let Err(e) = open_in_browser(url) {
            warn!("Could not open {} in the browser: {}", url, e);
        }
    }
}

/// Print a fatal error. A missing token gets guidance on where to find
/// one and how to export it.
pub fn report_fatal(error: &UploadError) {
    match error {
        UploadError::MissingToken => {
            eprintln!("{}", format!("ERROR: {}!", error).red());
            eprintln!(
                "{} {}",
                "You can find your account token on this page:".red().dim(),
                PROFILE_URL.blue().underlined()
            );
            eprintln!(
                "{}",
                "Copy it then export it as `GOFILE_TOKEN`. For example:\nexport GOFILE_TOKEN='xxxxxxxxxxxxxxxxx'"
                    .red()
                    .dim()
            );
        }
        UploadError::Transport(_) | UploadError::Status { .. } => {
            eprintln!("{} {}", "Connection error:".red(), error);
        }
        other => {
            eprintln!("{} {}", "Error:".red(), other);
        }
    }
}

fn opener(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(url);
        cmd
    } else if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", url]);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(url);
        cmd
    }
}

/// Open `url` with the platform's default handler.
pub fn open_in_browser(url: &str) -> io::Result<()> {
    let status = opener(url).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("opener exited with {}", status),
        ))
    }
}
