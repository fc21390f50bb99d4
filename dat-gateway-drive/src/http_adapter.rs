use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::drive::{DriveError, FsDrive};

/// Answers a GET request against a materialized drive.
///
/// This is deliberately the narrow adapter spec.md §1 calls out as an
/// out-of-scope external collaborator: it serves plain file bytes with a
/// guessed content type and 200/404 status, with no range requests,
/// conditional requests, or content transformation.
pub async fn serve(drive: &FsDrive, subpath: &str) -> Response<Full<Bytes>> {
    match drive.stat(subpath).await {
        Ok(stat) if stat.is_directory => serve_file(drive, &join(subpath, "index.html")).await,
        Ok(_) => serve_file(drive, subpath).await,
        Err(DriveError::NotFound) => not_found(),
        Err(_) => server_error(),
    }
}

async fn serve_file(drive: &FsDrive, path: &str) -> Response<Full<Bytes>> {
    match drive.read_file(path).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();
            Response::builder()
                .status(StatusCode::OK)
                .header("content-type", content_type)
                .body(Full::new(Bytes::from(bytes)))
                .expect("valid response")
        }
        Err(DriveError::NotFound) => not_found(),
        Err(_) => server_error(),
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from_static(b"Not found")))
        .expect("valid response")
}

fn server_error() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Full::new(Bytes::from_static(b"Server error")))
        .expect("valid response")
}
