use rand::Rng;
use rand::rngs::StdRng;
use reqwest::header::COOKIE;
use reqwest::{Client, Method, Response, StatusCode};
use std::fmt::{Debug, Display};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const LOGIN_PATH: &str = "/cgi-bin/postauth.cgi";
pub const LOGOUT_PATH: &str = "/cgi-bin/postlogout.cgi";

#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The cookie handed out by a device after a successful login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionToken {
    name: String,
    value: String,
}

impl SessionToken {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SessionToken {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Cookie-based session with a single device.
///
/// At most one token is held at a time: `login` refuses to run while a token
/// is present, so a stale token has to be dropped with `invalidate` or
/// `logout` first.
#[derive(Debug)]
pub struct Session {
    base: Url,
    credentials: Credentials,
    client: Client,
    rng: StdRng,
    token: Option<SessionToken>,
}

impl Session {
    pub fn new(base: &str, credentials: Credentials, client: Client, rng: StdRng) -> Result<Self, SessionError> {
        let base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(SessionError::UnusableUrl(base.to_string()));
        }

        Ok(Session {
            base,
            credentials,
            client,
            rng,
            token: None,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[instrument(skip(self), fields(server = %self.base))]
    pub async fn login(&mut self) -> Result<(), SessionError> {
        if self.token.is_some() {
            return Err(SessionError::AlreadyAuthenticated);
        }

        debug!("🔑 Logging in...");
        let access_value = self.rng.gen_range(0..1000u32).to_string();
        let form = [
            ("AccessVal", access_value.as_str()),
            ("LoginUser", self.credentials.username.as_str()),
            ("LoginPass", self.credentials.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .form(&form)
            .send()
            .await
            .map_err(SessionError::LoginRequest)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SessionError::Authentication {
                message: format!("device answered HTTP {}", status),
            });
        }

        let token = response
            .cookies()
            .next()
            .map(|cookie| SessionToken::new(cookie.name(), cookie.value()))
            .ok_or_else(|| SessionError::Authentication {
                message: "no session cookie returned".to_string(),
            })?;

        debug!("🔑 Logging in... OK");
        self.token = Some(token);
        Ok(())
    }

    pub async fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, SessionError> {
        let token = self.token.as_ref().ok_or(SessionError::NotAuthenticated)?;

        let mut request = self.client.request(method, self.url(path)).header(COOKIE, token.to_string());
        if let Some(form) = form {
            request = request.form(form);
        }

        Ok(request.send().await?)
    }

    /// Drops the held token without telling the device, e.g. after it expired.
    pub fn invalidate(&mut self) -> Option<SessionToken> {
        self.token.take()
    }

    /// Ends the session. Failures are ignored, the token is dropped regardless.
    #[instrument(skip(self), fields(server = %self.base))]
    pub async fn logout(&mut self) {
        debug!("🔒 Logging out...");
        match self.authenticated_request(Method::POST, LOGOUT_PATH, Some(&[("Logout", "1")][..])).await {
            Ok(_) => debug!("🔒 Logging out... OK"),
            Err(e) => debug!("🔒 Logging out... failed, ignoring: {}", e),
        }
        self.token = None;
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url
    }
}

#[cfg(test)]
impl Session {
    pub(crate) fn with_token(mut self, token: SessionToken) -> Self {
        self.token = Some(token);
        self
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid device address: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("'{0}' cannot be used as a device address")]
    UnusableUrl(String),
    #[error("authentication failed: {message}")]
    Authentication { message: String },
    #[error("login request failed: {0}")]
    LoginRequest(#[source] reqwest::Error),
    #[error("already logged in")]
    AlreadyAuthenticated,
    #[error("not logged in")]
    NotAuthenticated,
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SessionError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, SessionError::Authentication { .. } | SessionError::LoginRequest(_))
    }
}
