//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use wallhaven_core::{
    Category, DownloadJob, FileSink, Purity, RateLimiter, WallhavenClient, WallpaperDescriptor,
};
use wiremock::MockServer;

/// Bytes served as the image body.
pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0fake-jpeg-payload";

pub fn api_client(server: &MockServer) -> WallhavenClient {
    WallhavenClient::new(Arc::new(RateLimiter::disabled()), None).with_base_url(server.uri())
}

pub fn file_sink(server: &MockServer) -> FileSink {
    FileSink::new(api_client(server))
}

/// Path of the mock image for `id`, as served by the mock server.
pub fn image_path(id: &str) -> String {
    format!("/full/{id}.jpg")
}

pub fn image_url(server: &MockServer, id: &str) -> String {
    format!("{}{}", server.uri(), image_path(id))
}

pub fn descriptor(id: &str, source_url: impl Into<String>) -> WallpaperDescriptor {
    WallpaperDescriptor {
        id: id.to_string(),
        source_url: source_url.into(),
        purity: Purity::Sfw,
        category: Category::General,
        collection_name: None,
        file_type: Some("image/jpeg".to_string()),
    }
}

pub fn job(server: &MockServer, id: &str, dir: &Path) -> DownloadJob {
    DownloadJob::new(descriptor(id, image_url(server, id)), dir)
}

pub fn wallpaper_json(server: &MockServer, id: &str, purity: &str, category: &str) -> Value {
    json!({
        "id": id,
        "path": image_url(server, id),
        "purity": purity,
        "category": category,
        "file_type": "image/jpeg"
    })
}

pub fn page(data: Vec<Value>, current: u32, last: u32) -> Value {
    json!({
        "data": data,
        "meta": {"current_page": current, "last_page": last, "per_page": 24, "total": 0}
    })
}

pub fn collections(entries: &[(u64, &str)]) -> Value {
    let data: Vec<Value> = entries
        .iter()
        .map(|(id, label)| json!({"id": id, "label": label, "views": 0, "public": 1, "count": 1}))
        .collect();
    json!({ "data": data })
}
