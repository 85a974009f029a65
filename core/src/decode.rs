//! Classification of successful responses by declared response kind.

use std::convert::Infallible;

use bytes::Bytes;
use serde_json::{json, Map, Value};

use crate::error::{RequestError, Result};
use crate::headers;
use crate::http::HttpResponse;
use crate::types::{FormData, FormFile, FormPart, ResponseKind, ResponseValue};

/// Decode the body of a 2xx `response` as `kind`.
pub(crate) async fn decode(kind: ResponseKind, response: HttpResponse) -> Result<ResponseValue> {
    match kind {
        ResponseKind::Json => decode_json(&response).map(ResponseValue::Json),
        ResponseKind::Blob => Ok(ResponseValue::Blob(response.body)),
        ResponseKind::Text => Ok(ResponseValue::Text(text(&response.body))),
        ResponseKind::FormData => {
            let content_type = response.content_type();
            if !content_type.contains(headers::MULTIPART_FORM_DATA) {
                return Err(RequestError::UnexpectedContentType {
                    expected: ResponseKind::FormData,
                    content_type: content_type.to_owned(),
                });
            }
            let boundary = multer::parse_boundary(content_type)?;
            decode_form(boundary, response.body)
                .await
                .map(ResponseValue::FormData)
        }
    }
}

/// JSON content-types must decode. Anything else is read as text: blank
/// bodies become `{}`, and text that is not JSON is wrapped as
/// `{"success": true, "data": <text>}` with a warning.
fn decode_json(response: &HttpResponse) -> Result<Value> {
    let content_type = response.content_type();
    if content_type.contains(headers::APPLICATION_JSON) || content_type.contains(headers::TEXT_JSON) {
        return serde_json::from_slice(&response.body)
            .map_err(|e| RequestError::Decode(format!("invalid JSON body: {e}")));
    }

    let body = text(&response.body);
    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(_) => {
            tracing::warn!(content_type, body = %body, "expected JSON but got non-JSON body");
            Ok(json!({ "success": true, "data": body }))
        }
    }
}

async fn decode_form(boundary: String, body: Vec<u8>) -> Result<FormData> {
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(Bytes::from(body)) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = FormData::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = field.bytes().await?;

        let part = match filename {
            Some(filename) => FormPart::File(FormFile {
                filename: Some(filename),
                content_type,
                bytes: bytes.to_vec(),
            }),
            None => FormPart::Text(text(&bytes)),
        };
        form.append(name, part);
    }
    Ok(form)
}

/// Invalid UTF-8 is replaced rather than rejected.
fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
