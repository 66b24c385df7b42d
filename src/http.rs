//! Generic asynchronous HTTP client.
//!
//! [`HttpClient`] owns a reusable `reqwest` session and funnels every verb
//! through [`HttpClient::request`], which is the only place where default and
//! per-call headers and timeouts are merged.

use crate::error::Error;
use crate::session::{Lifecycle, SessionGuard};
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, redirect};
pub use reqwest::{Method, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;


/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL that relative request URLs are resolved against.
    pub base_url: Option<String>,
    /// Headers sent with every request unless overridden per call.
    pub headers: Vec<(String, String)>,
    /// Default request timeout. `None` disables the timeout.
    pub timeout: Option<Duration>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Raw(Vec<u8>),
    Form(String),
    Json(Vec<u8>),
}

/// Per-call request options.
///
/// Built fluently; encoding failures are deferred and reported by
/// [`HttpClient::request`], the same way `reqwest::RequestBuilder` does.
#[derive(Debug)]
pub struct RequestOptions {
    query: Vec<String>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    payload: Option<Payload>,
    timeout: Option<Duration>,
    allow_redirects: bool,
    error: Option<Error>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            payload: None,
            timeout: None,
            allow_redirects: true,
            error: None,
        }
    }
}

impl RequestOptions {
    /// Creates empty options (redirects followed, client timeout).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends query parameters serialized with `serde_urlencoded`.
    #[must_use]
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Self {
        match serde_urlencoded::to_string(params) {
            Ok(encoded) if encoded.is_empty() => {}
            Ok(encoded) => self.query.push(encoded),
            Err(e) => self.fail(e.into()),
        }
        self
    }

    /// Adds a header. A later call with the same name replaces the value.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Adds every header in `headers`.
    #[must_use]
    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |opts, (k, v)| opts.header(k.as_ref(), v.as_ref()))
    }

    /// Adds a cookie sent in the `Cookie` header of this request only.
    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets a raw request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(Payload::Raw(body.into()));
        self
    }

    /// Sets a `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(encoded) => self.payload = Some(Payload::Form(encoded)),
            Err(e) => self.fail(e.into()),
        }
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => self.payload = Some(Payload::Json(bytes)),
            Err(e) => self.fail(e.into()),
        }
        self
    }

    /// Overrides the client timeout for this call only.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables following redirects (default: enabled).
    #[must_use]
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Pair of transport clients backing one session.
///
/// `reqwest` fixes the redirect policy per client, so the session keeps one
/// client per policy.
#[derive(Debug, Clone)]
struct Session {
    follow: Client,
    no_follow: Client,
}

/// Asynchronous HTTP client with an explicit session lifecycle.
#[derive(Debug)]
pub struct HttpClient {
    base_url: Option<String>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    session: Option<Session>,
}

impl HttpClient {
    /// Creates a new, not yet started client.
    ///
    /// # Errors
    /// Returns error if a default header name or value is invalid.
    pub fn new(config: HttpConfig) -> Result<Self, Error> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            base_url: config
                .base_url
                .map(|url| url.trim_end_matches('/').to_string()),
            default_headers,
            timeout: config.timeout,
            session: None,
        })
    }

    /// Returns the base URL, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Returns the client-level timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Opens the session.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if the session is active, or an HTTP
    /// error if the transport cannot be built.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.session.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let follow = Client::builder().build()?;
        let no_follow = Client::builder().redirect(redirect::Policy::none()).build()?;
        self.session = Some(Session { follow, no_follow });

        info!("HTTP session started");
        Ok(())
    }

    /// Closes the session. Idempotent.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            info!("HTTP session closed");
        }
    }

    /// Returns true while the session is open.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Starts the session and returns a guard that closes it on drop.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] if the session is already open.
    pub fn session(&mut self) -> Result<SessionGuard<'_, Self>, Error> {
        SessionGuard::open(self)
    }

    /// Executes one HTTP request and returns the raw response.
    ///
    /// Per-call headers replace default headers with the same name, and a
    /// per-call timeout replaces the client timeout. The status code is not
    /// interpreted.
    ///
    /// # Errors
    /// Returns [`Error::NotStarted`] without a session, a deferred option
    /// error, an URL error, or the transport error.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let session = self.session.as_ref().ok_or(Error::NotStarted)?;
        let RequestOptions {
            query,
            headers,
            cookies,
            payload,
            timeout,
            allow_redirects,
            error,
        } = options;
        if let Some(error) = error {
            return Err(error);
        }

        let target = self.build_url(url, &query)?;
        let mut headers = merge_headers(&self.default_headers, &headers);
        if !cookies.is_empty() {
            let cookie = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| Error::InvalidHeader(format!("cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let body = match payload {
            Some(Payload::Raw(bytes)) => Some(bytes),
            Some(Payload::Form(form)) => {
                set_default_content_type(&mut headers, "application/x-www-form-urlencoded");
                Some(form.into_bytes())
            }
            Some(Payload::Json(bytes)) => {
                set_default_content_type(&mut headers, "application/json");
                Some(bytes)
            }
            None => None,
        };

        let client = if allow_redirects {
            &session.follow
        } else {
            &session.no_follow
        };

        debug!(
            "{} {}{}",
            method,
            target.host_str().unwrap_or_default(),
            last_segment(&target)
        );

        let mut builder = client.request(method, target).headers(headers);
        if let Some(timeout) = timeout.or(self.timeout) {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        debug!("Response status {}", response.status());
        Ok(response)
    }

    /// Sends a GET request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::GET, url, options).await
    }

    /// Sends a POST request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::POST, url, options).await
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::PUT, url, options).await
    }

    /// Sends a PATCH request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::PATCH, url, options).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::DELETE, url, options).await
    }

    /// Sends a HEAD request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::HEAD, url, options).await
    }

    /// Sends an OPTIONS request.
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::OPTIONS, url, options).await
    }

    /// Resolves `url` against the base URL and appends encoded query parts.
    fn build_url(&self, url: &str, query: &[String]) -> Result<Url, Error> {
        let mut target = match (Url::parse(url), &self.base_url) {
            (Ok(absolute), _) => absolute,
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => {
                Url::parse(&format!("{}/{}", base, url.trim_start_matches('/')))?
            }
            (Err(e), _) => return Err(e.into()),
        };

        if !query.is_empty() {
            let extra = query.join("&");
            let combined = match target.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, extra),
                _ => extra,
            };
            target.set_query(Some(&combined));
        }

        Ok(target)
    }
}

impl Lifecycle for HttpClient {
    fn start(&mut self) -> Result<(), Error> {
        HttpClient::start(self)
    }

    fn close(&mut self) {
        HttpClient::close(self);
    }

    fn is_started(&self) -> bool {
        HttpClient::is_started(self)
    }
}

/// Merges `overrides` over `defaults`; an override replaces every default
/// value stored under the same name.
#[must_use]
pub fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
    }
    for (name, value) in overrides {
        merged.append(name.clone(), value.clone());
    }
    merged
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;
    Ok((header_name, header_value))
}

fn set_default_content_type(headers: &mut HeaderMap, content_type: &'static str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
}

/// Trailing path segment for log lines; webhook paths carry the secret.
fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("/.../{}", segment))
        .unwrap_or_default()
}
