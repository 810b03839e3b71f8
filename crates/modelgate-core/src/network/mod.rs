//! Network utilities: HTTP client, location handling and artifact downloads.

mod client;
mod download;
mod location;

pub use client::HttpClient;
pub use download::{download_file, sha256_file, FileSlot};
pub use location::{fetch_json, read_location, Location};
