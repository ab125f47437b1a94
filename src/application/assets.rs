use axum::body::Body;
use axum::http::header;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::response::Response;
use rust_embed::RustEmbed;

/// Browser chat client, compiled into the binary.
#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

pub const INDEX: &str = "index.html";

/// Embedded file at `path` with its guessed content type, if there is one.
pub fn get(path: &str) -> Option<Response> {
    let file = Assets::get(path.trim_start_matches('/'))?;
    let content_type = HeaderValue::from_str(file.metadata.mimetype())
        .unwrap_or_else(|_| return HeaderValue::from_static("application/octet-stream"));

    return Some(
        (
            [(header::CONTENT_TYPE, content_type)],
            Body::from(file.data.into_owned()),
        )
            .into_response(),
    );
}
