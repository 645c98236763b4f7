//! ReqwestTransport - 本番用の HTTP transport

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};

use crate::domain::UploadForm;
use crate::ports::{
    Method, ProgressFn, RequestBody, Transport, TransportError, TransportRequest,
    TransportResponse,
};

/// Upload bodies are streamed in chunks of this size so byte progress can be
/// reported while the request is being written.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("client", &self.client)
            .finish()
    }
}

impl ReqwestTransport {
    /// `timeout` is the caller-imposed limit; the gateway itself sets none.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent("marquee/core");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError(format!("failed to initialize HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => {
                builder.multipart(multipart_form(form, request.progress.clone())?)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError(format!("request to {} failed: {err}", request.url)))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            TransportError(format!("failed to read response from {}: {err}", request.url))
        })?;

        Ok(TransportResponse { status, body })
    }
}

fn multipart_form(form: UploadForm, progress: Option<ProgressFn>) -> Result<Form, TransportError> {
    let total = form.bytes.len() as u64;
    let tags = form.tags_field();
    let chunks: Vec<Vec<u8>> = form
        .bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(<[u8]>::to_vec)
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(report) = &progress {
            report(sent, total);
        }
        Ok::<_, std::io::Error>(chunk)
    });

    let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        .file_name(form.file_name)
        .mime_str(&form.content_type)
        .map_err(|err| TransportError(format!("invalid content type: {err}")))?;

    let mut multipart = Form::new().part("file", part).text("tags", tags);
    if let Some(property) = form.property {
        multipart = multipart.text("property", property);
    }
    if let Some(folder) = form.folder {
        multipart = multipart.text("folder", folder);
    }
    Ok(multipart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_and_without_timeout() {
        assert!(ReqwestTransport::new(None).is_ok());
        assert!(ReqwestTransport::new(Some(Duration::from_secs(5))).is_ok());
    }

    #[test]
    fn bad_content_type_is_rejected_before_sending() {
        let form = UploadForm::new("a.bin", "not a mime", vec![0; 4]);
        assert!(multipart_form(form, None).is_err());
    }
}
