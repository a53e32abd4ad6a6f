//! Authenticated access to the feed origin.
//!
//! Two modes: `Basic` attaches credentials to every request and never
//! expires; `Cookie` performs a login-form handshake once and renews the
//! whole session when the origin starts answering 401/403. The session is
//! a swappable `Arc<Client>` snapshot: renewal builds a fresh client and
//! replaces the handle, so a fetch already in flight completes against
//! the old session untouched.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::{Client, Response, StatusCode};
use scraper::{Html, Selector};
use tokio::sync::RwLock;
use url::Url;

use crate::{config::Config, errors::Error, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The login form and field names of the upstream CMS, plus the markers
/// used to detect a login page being served back after a failed submit.
const LOGIN_FORM_SELECTOR: &str = "form#user-login-form";
const USERNAME_FIELD: &str = "name";
const PASSWORD_FIELD: &str = "pass";
const FORM_ID_FIELD: &str = "form_id";
const FORM_ID_DEFAULT: &str = "user_login_form";
const SUBMIT_FIELD: &str = "op";
const SUBMIT_DEFAULT: &str = "Log in";
const LOGIN_FORM_MARKER: &str = "user-login-form";
const LOGIN_PATH_MARKER: &str = "user/login";

/// Authentication strategy, selected once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    /// Credentials attached per request; nothing to renew.
    Basic,
    /// Server-side session established by a login handshake; renewable.
    Cookie,
}

impl AuthMethod {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "cookie" => Ok(Self::Cookie),
            other => Err(Error::Config(format!(
                "unsupported FEED_AUTH_METHOD: {other}"
            ))),
        }
    }
}

/// Owns the authenticated HTTP context used for every fetch against the
/// feed origin.
pub struct SessionManager {
    method: AuthMethod,
    origin: Option<String>,
    login_path: String,
    username: Option<String>,
    password: Option<String>,
    client: RwLock<Arc<Client>>,
}

impl SessionManager {
    pub fn new(
        method: AuthMethod,
        origin: Option<String>,
        login_path: String,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let client = build_client(method)?;
        Ok(Self {
            method,
            origin,
            login_path,
            username,
            password,
            client: RwLock::new(Arc::new(client)),
        })
    }

    /// Build the manager from config and, for cookie auth, perform the
    /// initial login. A failed initial login is fatal.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let manager = Self::new(
            cfg.auth_method,
            cfg.feed_origin.clone(),
            cfg.login_path.clone(),
            cfg.auth_user.clone(),
            cfg.auth_password.clone(),
        )?;
        if manager.method == AuthMethod::Cookie {
            manager.renew().await?;
        }
        Ok(manager)
    }

    /// Authenticated GET with the one-shot renew-and-retry policy: an
    /// authorization failure triggers exactly one renewal and one retry;
    /// a second consecutive authorization failure is a hard error.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let resp = self.send_get(url).await?;
        if !is_auth_failure(resp.status()) {
            return Ok(resp);
        }

        tracing::warn!(status = %resp.status(), url, "authentication failed, renewing session");
        self.renew().await?;

        let resp = self.send_get(url).await?;
        if is_auth_failure(resp.status()) {
            return Err(Error::Fetch(format!(
                "authentication still failing after renewal (status {})",
                resp.status().as_u16()
            )));
        }
        Ok(resp)
    }

    /// `get`, additionally requiring a 2xx status.
    pub async fn get_ok(&self, url: &str) -> Result<Response> {
        let resp = self.get(url).await?;
        if !resp.status().is_success() {
            return Err(Error::Fetch(format!(
                "unexpected status code: {}",
                resp.status().as_u16()
            )));
        }
        Ok(resp)
    }

    /// Re-establish the session. A no-op for basic auth; for cookie auth
    /// this performs a fresh login on a fresh client (fresh cookie jar)
    /// and atomically swaps it in.
    pub async fn renew(&self) -> Result<()> {
        match self.method {
            AuthMethod::Basic => Ok(()),
            AuthMethod::Cookie => {
                let (Some(username), Some(password)) = (&self.username, &self.password) else {
                    return Err(Error::Config(
                        "FEED_AUTH_USER and FEED_AUTH_PASSWORD are required for cookie auth"
                            .to_string(),
                    ));
                };
                let origin = self.origin.as_deref().ok_or_else(|| {
                    Error::Config("cookie auth requires an origin derived from FEED_URL".to_string())
                })?;

                let client = build_client(AuthMethod::Cookie)?;
                login(&client, origin, &self.login_path, username, password).await?;

                *self.client.write().await = Arc::new(client);
                tracing::info!("authentication renewed");
                Ok(())
            }
        }
    }

    /// Snapshot of the current session; renewal never mutates a client a
    /// reader already holds.
    async fn session(&self) -> Arc<Client> {
        self.client.read().await.clone()
    }

    async fn send_get(&self, url: &str) -> Result<Response> {
        let client = self.session().await;
        let mut request = client.get(url);
        if self.method == AuthMethod::Basic {
            if let (Some(username), Some(password)) = (&self.username, &self.password) {
                request = request.basic_auth(username, Some(password));
            }
        }
        Ok(request.send().await?)
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn build_client(method: AuthMethod) -> Result<Client> {
    let builder = Client::builder().timeout(HTTP_TIMEOUT);
    let builder = match method {
        AuthMethod::Cookie => builder.cookie_store(true),
        AuthMethod::Basic => builder,
    };
    Ok(builder.build()?)
}

async fn login(
    client: &Client,
    origin: &str,
    login_path: &str,
    username: &str,
    password: &str,
) -> Result<()> {
    let login_page_url = resolve_url(origin, login_path)?;
    tracing::info!(url = %login_page_url, "loading login page");

    let resp = client.get(&login_page_url).send().await?;
    if resp.status() != StatusCode::OK {
        return Err(Error::Auth(format!(
            "login page returned status {}",
            resp.status().as_u16()
        )));
    }
    let page = resp.text().await?;

    let form = parse_login_form(&page, &login_page_url, username, password)?;
    tracing::debug!(action = %form.action, "submitting login form");

    let post = client.post(&form.action).form(&form.fields).send().await?;
    let status = post.status();
    let final_path = post.url().path().to_string();
    let body = post.text().await?;

    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Auth(format!(
            "login failed with status {}",
            status.as_u16()
        )));
    }
    // A 2xx that serves the login form back on the login path means the
    // credentials were rejected.
    if body.contains(LOGIN_FORM_MARKER) && final_path.contains(LOGIN_PATH_MARKER) {
        return Err(Error::Auth(
            "login failed: check username/password".to_string(),
        ));
    }

    tracing::info!("login successful");
    Ok(())
}

struct LoginForm {
    action: String,
    fields: HashMap<String, String>,
}

/// Extract the login form: submission target resolved against the page
/// URL, username/password filled in under the form's field names, and
/// every other input's default value copied forward unchanged so hidden
/// anti-forgery and form-identity fields survive the round trip.
fn parse_login_form(
    html: &str,
    page_url: &str,
    username: &str,
    password: &str,
) -> Result<LoginForm> {
    let doc = Html::parse_document(html);
    let login_form = Selector::parse(LOGIN_FORM_SELECTOR).map_err(|e| Error::Parse(e.to_string()))?;
    let any_form = Selector::parse("form").map_err(|e| Error::Parse(e.to_string()))?;
    let inputs = Selector::parse("input").map_err(|e| Error::Parse(e.to_string()))?;

    let form = doc
        .select(&login_form)
        .next()
        .or_else(|| doc.select(&any_form).next())
        .ok_or_else(|| Error::Auth("login form not found on login page".to_string()))?;

    let action = form
        .value()
        .attr("action")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(page_url);
    let action = resolve_url(page_url, action)?;

    let mut fields = HashMap::new();
    fields.insert(USERNAME_FIELD.to_string(), username.to_string());
    fields.insert(PASSWORD_FIELD.to_string(), password.to_string());

    for input in form.select(&inputs) {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        if name.is_empty() || name == USERNAME_FIELD || name == PASSWORD_FIELD {
            continue;
        }
        if let Some(value) = input.value().attr("value") {
            fields.insert(name.to_string(), value.to_string());
        }
    }

    default_field(&mut fields, FORM_ID_FIELD, FORM_ID_DEFAULT);
    default_field(&mut fields, SUBMIT_FIELD, SUBMIT_DEFAULT);

    Ok(LoginForm { action, fields })
}

fn default_field(fields: &mut HashMap<String, String>, key: &str, default: &str) {
    if fields.get(key).map_or(true, |v| v.is_empty()) {
        fields.insert(key.to_string(), default.to_string());
    }
}

/// Resolve a possibly-relative reference against a base URL. Absolute
/// references pass through untouched.
fn resolve_url(base: &str, reference: &str) -> Result<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(reference.to_string());
    }
    let base = Url::parse(base)
        .map_err(|e| Error::Auth(format!("failed to parse base URL {base:?}: {e}")))?;
    let joined = base
        .join(reference)
        .map_err(|e| Error::Auth(format!("failed to resolve URL {reference:?}: {e}")))?;
    Ok(joined.to_string())
}
