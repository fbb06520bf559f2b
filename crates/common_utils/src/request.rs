//! Outbound request model shared by all provider adapters.

use masking::{Maskable, Secret};
use serde::{Deserialize, Serialize};

/// Headers attached to an outbound request. Secret values stay masked in
/// debug output until the HTTP layer unwraps them.
pub type Headers = Vec<(String, Maskable<String>)>;

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Wire encoding of the request body.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum ContentType {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    FormUrlEncoded,
    /// `text/xml`
    Xml,
}

impl ContentType {
    /// Header value for the content type.
    pub const fn header_value(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::Xml => "text/xml; charset=utf-8",
        }
    }
}

/// A fully-built outbound request.
#[derive(Debug)]
pub struct Request {
    /// Target URL
    pub url: String,
    /// Headers to attach
    pub headers: Headers,
    /// Raw body payload
    pub payload: Option<Secret<String>>,
    /// Pre-encoded body bytes, for wire formats that are not UTF-8
    /// (ISO-8859-9 XML). Takes precedence over `payload` when set.
    pub encoded_payload: Option<Vec<u8>>,
    /// HTTP method
    pub method: Method,
    /// Body encoding
    pub content_type: Option<ContentType>,
    /// Accept certificates that fail verification. Only set for legacy
    /// acquirer hosts that opted in at the terminal level.
    pub allow_invalid_certs: bool,
}

impl Request {
    /// Start a request towards `url`.
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: String::from(url),
            headers: Vec::new(),
            payload: None,
            encoded_payload: None,
            content_type: None,
            allow_invalid_certs: false,
        }
    }

    /// Set the raw body.
    pub fn set_body(&mut self, body: String) {
        self.payload = Some(body.into());
    }

    /// Add a single header.
    pub fn add_header(&mut self, header: &str, value: Maskable<String>) {
        self.headers.push((String::from(header), value));
    }

    /// Set the body encoding.
    pub fn add_content_type(&mut self, content_type: ContentType) {
        self.content_type = Some(content_type);
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    url: String,
    headers: Headers,
    payload: Option<Secret<String>>,
    encoded_payload: Option<Vec<u8>>,
    method: Method,
    content_type: Option<ContentType>,
    allow_invalid_certs: bool,
}

impl RequestBuilder {
    /// Fresh builder, `GET` until told otherwise.
    pub fn new() -> Self {
        Self {
            method: Method::Get,
            url: String::with_capacity(1024),
            headers: Vec::new(),
            payload: None,
            encoded_payload: None,
            content_type: None,
            allow_invalid_certs: false,
        }
    }

    /// Target URL.
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.into();
        self
    }

    /// HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Append a header.
    pub fn header(mut self, header: &str, value: Maskable<String>) -> Self {
        self.headers.push((header.into(), value));
        self
    }

    /// Append a batch of headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Attach a body.
    pub fn body(mut self, body: Option<String>) -> Self {
        self.payload = body.map(From::from);
        self
    }

    /// Attach a pre-encoded (non-UTF-8) body.
    pub fn encoded_body(mut self, body: Vec<u8>) -> Self {
        self.encoded_payload = Some(body);
        self
    }

    /// Body encoding.
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Relax TLS verification for this request.
    pub fn allow_invalid_certs(mut self, allow: bool) -> Self {
        self.allow_invalid_certs = allow;
        self
    }

    /// Finish building.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            payload: self.payload,
            encoded_payload: self.encoded_payload,
            content_type: self.content_type,
            allow_invalid_certs: self.allow_invalid_certs,
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
