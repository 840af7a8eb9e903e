//! Shared utilities for integration testing.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use axum::Router;
use std::net::SocketAddr;

use upload_gate::{GateConfig, HttpServer};

pub const BOUNDARY: &str = "----upload-gate-test-boundary";
pub const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";

/// Leading bytes of a JPEG file.
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

/// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(field, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Router with defaults, ready for `oneshot`.
pub fn app(config: GateConfig) -> Router {
    HttpServer::new(config).router()
}

/// Peer address of a test client.
pub fn peer(ip: &str) -> SocketAddr {
    format!("{ip}:40000").parse().unwrap()
}

/// Browser-like compress request from `ip`.
pub fn compress_request(ip: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/compress")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::USER_AGENT, BROWSER_UA)
        .extension(ConnectInfo(peer(ip)))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// A small valid upload: one JPEG, kept as is.
pub fn jpeg_upload(ip: &str) -> Request<Body> {
    compress_request(
        ip,
        &[
            Part::File {
                name: "photo.jpg",
                content_type: "image/jpeg",
                data: JPEG_BYTES,
            },
            Part::Text("compressionLevel", "80"),
            Part::Text("fileType", "all"),
        ],
    )
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
