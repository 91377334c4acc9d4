//! Shared fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used)]

use aisync_ingest::config::IngestConfig;
use std::io::Write;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory ZIP archive with the given entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Apache-style directory listing linking each id
pub fn listing_html(ids: &[&str]) -> String {
    let mut html = String::from(
        "<html><head><title>Index</title></head><body><h1>Index</h1>\n\
         <a href=\"../\">Parent Directory</a>\n",
    );
    for id in ids {
        html.push_str(&format!("<a href=\"{id}\">{id}</a>\n"));
    }
    html.push_str("<a href=\"README.txt\">README.txt</a>\n</body></html>");
    html
}

pub async fn mount_listing(server: &MockServer, year: u16, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", year)))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(ids)))
        .mount(server)
        .await;
}

/// Serve a daily archive holding one CSV named after it
pub async fn mount_archive(server: &MockServer, year: u16, id: &str, expected_fetches: u64) {
    let csv_name = id.replace(".zip", ".csv");
    let body = zip_bytes(&[(csv_name.as_str(), b"MMSI,BaseDateTime,LAT,LON\n367000001,2020-01-01T00:00:00,29.9,-89.9\n")]);

    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", year, id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected_fetches)
        .mount(server)
        .await;
}

pub async fn mount_raw(server: &MockServer, year: u16, id: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", year, id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

pub fn test_config(server: &MockServer, root: &Path) -> IngestConfig {
    IngestConfig::builder()
        .listing_url_template(format!("{}/{{year}}/", server.uri()))
        .ledger_path(root.join("processed_files.txt"))
        .work_dir(root.join("work"))
        .scratch_root(root.join("unzipped"))
        .concurrency(4)
        .max_attempts(3)
        .retry_base_delay_ms(1)
        .show_progress(false)
        .build()
        .unwrap()
}

/// Every regular file below `dir`
pub fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(files_under(&path));
            } else {
                found.push(path);
            }
        }
    }
    found
}
