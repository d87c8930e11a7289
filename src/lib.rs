// Library root
// -----------
// This crate exposes the pieces of the `gofile` command so they can be
// tested without a terminal or a network.
//
// Module responsibilities:
// - `api`: HTTP calls to Gofile (server discovery, streaming upload) and
//   the `GofileApi` trait the orchestrator is written against.
// - `resolver`: expands file/folder arguments into the files to upload.
// - `upload`: the upload flow itself, records and the JSON export.
// - `ui`: terminal rendering of progress, panels and errors.
// - `cli` / `config`: command-line arguments and the upload token.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod resolver;
pub mod ui;
pub mod upload;

pub use error::UploadError;
pub use upload::{run, UploadOptions, UploadRecord, UploadTarget};
