// Upload orchestration: select a server, resolve the inputs, upload the
// files one after another and summarize the results.
//
// Display goes through the `Reporter` trait so the flow can run against
// the terminal (`ui::Terminal`) or a recording double in tests.

use crate::api::{GofileApi, ProgressSink, UploadRequest, UploadResponse};
use crate::error::UploadError;
use crate::resolver::{self, absolute};
use chrono::{Local, Utc};
use log::{debug, info};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// A file about to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTarget {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: String,
}

impl UploadTarget {
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let path = absolute(path);
        let size = fs::metadata(&path)
            .map_err(|source| UploadError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        Ok(UploadTarget {
            path,
            size,
            content_type,
        })
    }

    /// Base name sent as the multipart filename.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    }
}

/// One successful upload, as printed in verbose mode and exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub file: PathBuf,
    pub timestamp: String,
    pub response: Value,
}

/// Everything a run needs. The token is sourced once by the caller
/// (see `config::Settings`) and handed in here.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub paths: Vec<PathBuf>,
    pub to_single_folder: bool,
    pub verbose: bool,
    pub export: bool,
    pub open_urls: bool,
    pub folder_id: Option<String>,
    pub token: Option<String>,
    pub export_dir: PathBuf,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            paths: Vec::new(),
            to_single_folder: false,
            verbose: false,
            export: false,
            open_urls: false,
            folder_id: None,
            token: None,
            export_dir: PathBuf::from("."),
        }
    }
}

/// User-facing output of a run.
pub trait Reporter {
    /// An input path that does not exist and is skipped.
    fn missing_path(&mut self, path: &Path);

    /// Called before a file starts streaming; the returned sink receives
    /// the byte progress of that upload.
    fn upload_started(&mut self, target: &UploadTarget) -> Box<dyn ProgressSink>;

    fn upload_finished(&mut self, target: &UploadTarget);

    fn upload_failed(&mut self, target: &UploadTarget, error: &UploadError);

    /// Verbose mode: the full record.
    fn record(&mut self, record: &UploadRecord);

    /// Per-file result outside single-folder mode.
    fn file_uploaded(&mut self, file: &Path, url: &str);

    /// Single-folder mode: all files share one download page.
    fn folder_summary(&mut self, files: &[PathBuf], url: &str);

    fn exported(&mut self, path: &Path);

    fn open_url(&mut self, url: &str);
}

/// Upload every file named by `options.paths` and return the download
/// page of each upload, in upload order.
///
/// Missing inputs are reported and skipped. A missing token in
/// single-folder mode fails before any request is made. The first
/// failed upload aborts the rest of the queue and nothing is exported.
pub fn run<A, R>(api: &A, reporter: &mut R, options: &UploadOptions) -> Result<Vec<String>, UploadError>
where
    A: GofileApi + ?Sized,
    R: Reporter + ?Sized,
{
    let resolution = resolver::resolve(options.paths.as_slice());
    for path in &resolution.missing {
        reporter.missing_path(path);
    }

    let token = options.token.as_deref().filter(|t| !t.is_empty());
    if options.to_single_folder && token.is_none() {
        return Err(UploadError::MissingToken);
    }

    let server = api.select_server()?;
    info!("Using upload server {}", server);
    info!("{} file(s) to upload", resolution.files.len());

    let mut folder_id = options.folder_id.clone();
    let mut urls = Vec::with_capacity(resolution.files.len());
    let mut uploaded = Vec::with_capacity(resolution.files.len());
    let mut records = Vec::new();

    for file in &resolution.files {
        let target = UploadTarget::from_path(file)?;
        let response = upload_one(api, reporter, &server, &target, token, folder_id.as_deref())?;

        if options.to_single_folder && folder_id.is_none() {
            debug!("Uploads will go to folder {}", response.parent_folder);
            folder_id = Some(response.parent_folder.clone());
        }

        let record = UploadRecord {
            file: target.path.clone(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            response: response.raw,
        };
        urls.push(response.download_page.clone());

        if options.verbose {
            reporter.record(&record);
        } else if !options.to_single_folder {
            reporter.file_uploaded(file, &response.download_page);
        }

        uploaded.push(target.path);
        if options.export {
            records.push(record);
        }
    }

    if urls.is_empty() {
        return Ok(urls);
    }

    if options.to_single_folder {
        reporter.folder_summary(&uploaded, &urls[0]);
    }

    if options.export {
        let path = write_export(&options.export_dir, &records)?;
        info!("Wrote {} record(s) to {}", records.len(), path.display());
        reporter.exported(&path);
    }

    if options.open_urls {
        // Single-folder runs share one page; open it once.
        let mut opened: Vec<&str> = Vec::new();
        for url in &urls {
            if !opened.contains(&url.as_str()) {
                reporter.open_url(url);
                opened.push(url);
            }
        }
    }

    Ok(urls)
}

fn upload_one<A, R>(
    api: &A,
    reporter: &mut R,
    server: &str,
    target: &UploadTarget,
    token: Option<&str>,
    folder_id: Option<&str>,
) -> Result<UploadResponse, UploadError>
where
    A: GofileApi + ?Sized,
    R: Reporter + ?Sized,
{
    let progress = reporter.upload_started(target);
    let request = UploadRequest {
        server,
        target,
        token,
        folder_id,
    };
    match api.upload_file(request, progress) {
        Ok(response) => {
            reporter.upload_finished(target);
            Ok(response)
        }
        Err(e) => {
            reporter.upload_failed(target, &e);
            Err(e)
        }
    }
}

/// Name of the export file for a given unix timestamp.
pub fn export_file_name(unix_seconds: i64) -> String {
    format!("gofile_export_{}.json", unix_seconds)
}

/// Write `records` as a JSON array indented with four spaces into
/// `dir/gofile_export_<unix seconds>.json`.
pub fn write_export(dir: &Path, records: &[UploadRecord]) -> Result<PathBuf, UploadError> {
    let path = dir.join(export_file_name(Utc::now().timestamp()));
    let to_export_error = |source: std::io::Error| UploadError::Export {
        path: path.clone(),
        source,
    };

    // Serialize fully before touching the disk so a failure leaves no file.
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records
        .serialize(&mut ser)
        .map_err(|e| to_export_error(e.into()))?;
    fs::write(&path, &buf).map_err(to_export_error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoProgress;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Upload call as seen by the fake API.
    #[derive(Debug, Clone)]
    struct Call {
        file: PathBuf,
        token: Option<String>,
        folder_id: Option<String>,
    }

    struct FakeApi {
        calls: RefCell<Vec<Call>>,
        fail_on: Option<usize>,
        folder: String,
    }

    impl FakeApi {
        fn new() -> Self {
            FakeApi {
                calls: RefCell::new(Vec::new()),
                fail_on: None,
                folder: "folder-xyz".to_string(),
            }
        }

        fn failing_on(index: usize) -> Self {
            FakeApi {
                fail_on: Some(index),
                ..FakeApi::new()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl GofileApi for FakeApi {
        fn select_server(&self) -> Result<String, UploadError> {
            Ok("store1".to_string())
        }

        fn upload_file(
            &self,
            request: UploadRequest<'_>,
            progress: Box<dyn ProgressSink>,
        ) -> Result<UploadResponse, UploadError> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push(Call {
                file: request.target.path.clone(),
                token: request.token.map(str::to_string),
                folder_id: request.folder_id.map(str::to_string),
            });
            if self.fail_on == Some(index) {
                return Err(UploadError::unexpected("fake", "boom"));
            }
            progress.bytes_sent(request.target.size);

            // Without a folder id each upload lands in a fresh folder.
            let folder = request
                .folder_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-{}", self.folder, index));
            let raw = json!({
                "status": "ok",
                "data": {
                    "downloadPage": format!("https://gofile.io/d/{}", folder),
                    "parentFolder": folder,
                    "fileName": request.target.file_name(),
                }
            });
            UploadResponse::from_json("fake", raw)
        }
    }

    #[derive(Default)]
    struct Recorder {
        missing: Vec<PathBuf>,
        started: Vec<PathBuf>,
        failed: Vec<PathBuf>,
        records: Vec<UploadRecord>,
        panels: Vec<(PathBuf, String)>,
        summaries: Vec<(Vec<PathBuf>, String)>,
        exported: Vec<PathBuf>,
        opened: Vec<String>,
    }

    impl Reporter for Recorder {
        fn missing_path(&mut self, path: &Path) {
            self.missing.push(path.to_path_buf());
        }

        fn upload_started(&mut self, target: &UploadTarget) -> Box<dyn ProgressSink> {
            self.started.push(target.path.clone());
            Box::new(NoProgress)
        }

        fn upload_finished(&mut self, _target: &UploadTarget) {}

        fn upload_failed(&mut self, target: &UploadTarget, _error: &UploadError) {
            self.failed.push(target.path.clone());
        }

        fn record(&mut self, record: &UploadRecord) {
            self.records.push(record.clone());
        }

        fn file_uploaded(&mut self, file: &Path, url: &str) {
            self.panels.push((file.to_path_buf(), url.to_string()));
        }

        fn folder_summary(&mut self, files: &[PathBuf], url: &str) {
            self.summaries.push((files.to_vec(), url.to_string()));
        }

        fn exported(&mut self, path: &Path) {
            self.exported.push(path.to_path_buf());
        }

        fn open_url(&mut self, url: &str) {
            self.opened.push(url.to_string());
        }
    }

    fn files(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let paths = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    fn options(paths: Vec<PathBuf>) -> UploadOptions {
        UploadOptions {
            paths,
            ..UploadOptions::default()
        }
    }

    #[test]
    fn single_file_prints_one_panel() {
        let (_dir, paths) = files(&["a.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();

        let urls = run(&api, &mut rec, &options(paths.clone())).unwrap();

        assert_eq!(urls, vec!["https://gofile.io/d/folder-xyz-0".to_string()]);
        assert_eq!(api.calls().len(), 1);
        assert_eq!(rec.panels, vec![(paths[0].clone(), urls[0].clone())]);
        assert!(rec.summaries.is_empty());
        assert!(rec.exported.is_empty());
    }

    #[test]
    fn missing_input_uploads_nothing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missingfile");
        let api = FakeApi::new();
        let mut rec = Recorder::default();

        let urls = run(&api, &mut rec, &options(vec![missing.clone()])).unwrap();

        assert!(urls.is_empty());
        assert!(api.calls().is_empty());
        assert_eq!(rec.missing, vec![missing]);
        assert!(rec.panels.is_empty());
    }

    #[test]
    fn missing_input_does_not_stop_valid_ones() {
        let (dir, mut paths) = files(&["a.txt"]);
        paths.insert(0, dir.path().join("nope"));
        let api = FakeApi::new();
        let mut rec = Recorder::default();

        let urls = run(&api, &mut rec, &options(paths)).unwrap();

        assert_eq!(urls.len(), 1);
        assert_eq!(rec.missing.len(), 1);
    }

    #[test]
    fn single_folder_without_token_fails_before_uploading() {
        let (dir, _paths) = files(&["a.txt", "b.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            to_single_folder: true,
            token: Some(String::new()),
            ..options(vec![dir.path().to_path_buf()])
        };

        let err = run(&api, &mut rec, &opts).unwrap_err();

        assert!(matches!(err, UploadError::MissingToken));
        assert!(api.calls().is_empty());
        assert!(rec.started.is_empty());
    }

    #[test]
    fn missing_paths_are_reported_before_token_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("definitely_missing");
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            to_single_folder: true,
            ..options(vec![missing.clone()])
        };

        let err = run(&api, &mut rec, &opts).unwrap_err();

        assert!(matches!(err, UploadError::MissingToken));
        assert_eq!(rec.missing, vec![missing]);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn single_folder_reuses_first_parent_folder() {
        let (_dir, paths) = files(&["a.txt", "b.txt", "c.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            to_single_folder: true,
            token: Some("tok".to_string()),
            ..options(paths.clone())
        };

        let urls = run(&api, &mut rec, &opts).unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].folder_id, None);
        assert!(calls[1..]
            .iter()
            .all(|c| c.folder_id.as_deref() == Some("folder-xyz-0")));
        assert!(calls.iter().all(|c| c.token.as_deref() == Some("tok")));

        assert_eq!(urls.len(), 3);
        assert!(rec.panels.is_empty());
        assert_eq!(rec.summaries, vec![(paths, urls[0].clone())]);
    }

    #[test]
    fn supplied_folder_id_is_used_for_every_upload() {
        let (_dir, paths) = files(&["a.txt", "b.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            to_single_folder: true,
            token: Some("tok".to_string()),
            folder_id: Some("existing".to_string()),
            ..options(paths)
        };

        run(&api, &mut rec, &opts).unwrap();

        assert!(api
            .calls()
            .iter()
            .all(|c| c.folder_id.as_deref() == Some("existing")));
    }

    #[test]
    fn without_single_folder_each_upload_gets_its_own_folder() {
        let (_dir, paths) = files(&["a.txt", "b.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();

        let urls = run(&api, &mut rec, &options(paths)).unwrap();

        assert!(api.calls().iter().all(|c| c.folder_id.is_none() && c.token.is_none()));
        assert_ne!(urls[0], urls[1]);
        assert_eq!(rec.panels.len(), 2);
    }

    #[test]
    fn verbose_prints_records_instead_of_panels() {
        let (_dir, paths) = files(&["a.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            verbose: true,
            ..options(paths.clone())
        };

        run(&api, &mut rec, &opts).unwrap();

        assert!(rec.panels.is_empty());
        assert_eq!(rec.records.len(), 1);
        assert_eq!(rec.records[0].file, paths[0]);
        assert_eq!(rec.records[0].response["data"]["fileName"], "a.txt");
        // DD-MM-YYYY HH:MM:SS
        assert_eq!(rec.records[0].timestamp.len(), 19);
        assert_eq!(&rec.records[0].timestamp[2..3], "-");
        assert_eq!(&rec.records[0].timestamp[10..11], " ");
    }

    #[test]
    fn failed_upload_aborts_queue_without_export() {
        let (dir, paths) = files(&["a.txt", "b.txt", "c.txt"]);
        let api = FakeApi::failing_on(1);
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            export: true,
            export_dir: dir.path().to_path_buf(),
            ..options(paths.clone())
        };

        let err = run(&api, &mut rec, &opts).unwrap_err();

        assert!(matches!(err, UploadError::UnexpectedResponse { .. }));
        assert_eq!(api.calls().len(), 2);
        assert_eq!(rec.failed, vec![paths[1].clone()]);
        assert!(rec.exported.is_empty());
        let exports = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("gofile_export_")
            })
            .count();
        assert_eq!(exports, 0);
    }

    #[test]
    fn export_holds_one_record_per_upload() {
        let (dir, paths) = files(&["a.txt", "b.txt"]);
        let out = TempDir::new().unwrap();
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            export: true,
            export_dir: out.path().to_path_buf(),
            ..options(vec![paths[0].clone(), paths[1].clone()])
        };

        run(&api, &mut rec, &opts).unwrap();
        drop(dir);

        assert_eq!(rec.exported.len(), 1);
        let exported = &rec.exported[0];
        let name = exported.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("gofile_export_") && name.ends_with(".json"));

        let text = fs::read_to_string(exported).unwrap();
        assert!(text.contains("\n    {"));
        let data: Value = serde_json::from_str(&text).unwrap();
        let entries = data.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        for (entry, path) in entries.iter().zip(&paths) {
            assert_eq!(entry["file"], json!(path));
            assert_eq!(
                entry["response"]["data"]["fileName"],
                json!(path.file_name().unwrap().to_string_lossy())
            );
            assert!(entry["timestamp"].is_string());
        }
    }

    #[test]
    fn open_urls_opens_shared_page_once() {
        let (_dir, paths) = files(&["a.txt", "b.txt"]);
        let api = FakeApi::new();
        let mut rec = Recorder::default();
        let opts = UploadOptions {
            to_single_folder: true,
            open_urls: true,
            token: Some("tok".to_string()),
            ..options(paths)
        };

        let urls = run(&api, &mut rec, &opts).unwrap();

        assert_eq!(rec.opened, vec![urls[0].clone()]);
    }

    #[test]
    fn target_guesses_content_type() {
        let (_dir, paths) = files(&["photo.png", "blob.unknownext"]);
        let png = UploadTarget::from_path(&paths[0]).unwrap();
        let other = UploadTarget::from_path(&paths[1]).unwrap();

        assert_eq!(png.content_type, "image/png");
        assert_eq!(png.size, "photo.png".len() as u64);
        assert_eq!(png.file_name(), "photo.png");
        assert_eq!(other.content_type, FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn export_file_name_uses_unix_seconds() {
        assert_eq!(export_file_name(1700000000), "gofile_export_1700000000.json");
    }

    #[cfg(unix)]
    #[test]
    fn failed_export_leaves_no_file() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let out = TempDir::new().unwrap();
        let record = UploadRecord {
            file: PathBuf::from(OsStr::from_bytes(b"/tmp/not-utf8-\xff")),
            timestamp: "01-01-2024 00:00:00".to_string(),
            response: json!({}),
        };

        let err = write_export(out.path(), &[record]).unwrap_err();

        assert!(matches!(err, UploadError::Export { .. }));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
