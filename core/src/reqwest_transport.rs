//! `Transport` backed by `reqwest`.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{RequestError, Result};
use crate::headers;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::transport::Transport;
use crate::types::{FormData, FormPart};

/// Settings for the reqwest client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportSettings {
    /// Maximum number of redirects to follow (0 means redirects are not followed).
    pub redirect_limit: u32,
    pub user_agent: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            redirect_limit: 10,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let redirect = match settings.redirect_limit {
            0 => reqwest::redirect::Policy::none(),
            limit => reqwest::redirect::Policy::limited(limit as usize),
        };
        let mut builder = reqwest::Client::builder().redirect(redirect);
        if let Some(user_agent) = &settings.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        Ok(Self::from_client(builder.build()?))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn make_request(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };
        let multipart = matches!(request.body, Some(RequestBody::Multipart(_)));

        let mut builder = self.client.request(method, request.url);
        for (name, value) in request.headers {
            // reqwest writes the multipart content-type with its boundary.
            if multipart && name == headers::CONTENT_TYPE {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = match request.body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Multipart(form)) => builder.multipart(to_form(form)?),
            None => builder,
        };
        Ok(builder.send().await?)
    }

    async fn convert_response(&self, response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_owned(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.make_request(request).await?;
        self.convert_response(response).await
    }
}

fn to_form(form: FormData) -> Result<Form> {
    let mut out = Form::new();
    for (name, part) in form {
        out = match part {
            FormPart::Text(value) => out.text(name, value),
            FormPart::File(file) => {
                let mut part = Part::bytes(file.bytes);
                if let Some(filename) = file.filename {
                    part = part.file_name(filename);
                }
                if let Some(content_type) = file.content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|e| RequestError::Encode(format!("part {name}: {e}")))?;
                }
                out.part(name, part)
            }
        };
    }
    Ok(out)
}

impl From<reqwest::Error> for RequestError {
    fn from(error: reqwest::Error) -> Self {
        RequestError::Network(format!("reqwest error: {error}"))
    }
}
