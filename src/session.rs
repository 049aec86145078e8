//! Authenticated library sessions.
//!
//! A [`LibrarySession`] is a cookie-carrying HTTP client that has logged in to
//! the institutional proxy. [`LibrarySessionManager`] knows how to create one
//! from credentials and how to throw it away.

use crate::config::LibraryConfig;
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Opens and closes authenticated sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Send + Sync;

    /// Create a fully logged-in session, or fail with [`DigestError::Auth`].
    async fn open(&self) -> Result<Self::Session>;

    /// Release a session. Never fails.
    async fn close(&self, session: Self::Session);
}

/// Library account credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where and how to log in
#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub login_url: String,
    pub authenticated_prefix: String,
    pub proxy_prefix: String,
    pub username_selector: String,
    pub password_selector: String,
    pub user_agent: String,
    /// Upper bound for the whole login exchange
    pub wait: Duration,
}

impl LoginSettings {
    pub fn from_config(config: &LibraryConfig, wait: Duration) -> Self {
        Self {
            login_url: config.login_url.clone(),
            authenticated_prefix: config.authenticated_prefix.clone(),
            proxy_prefix: config.proxy_prefix.clone(),
            username_selector: config.username_selector.clone(),
            password_selector: config.password_selector.clone(),
            user_agent: config.user_agent.clone(),
            wait,
        }
    }
}

/// One logged-in session
#[derive(Debug)]
pub struct LibrarySession {
    id: u64,
    client: reqwest::Client,
    proxy_prefix: String,
}

impl LibrarySession {
    /// Identity of this session; a recreated session gets a new one
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fetch an article page through the proxy
    pub async fn get_html(&self, article_url: &str) -> Result<String> {
        let url = format!("{}{}", self.proxy_prefix, article_url);
        debug!(session = self.id, url = %url, "Fetching article page");

        let response = self
            .client
            .get(&url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Api {
                code: status.as_u16() as i32,
                message: format!("HTTP error: {}", status),
            });
        }

        Ok(response.text().await?)
    }
}

/// Form fields found on the login page
#[derive(Debug, PartialEq, Eq)]
struct LoginForm {
    action: Url,
    username_field: String,
    password_field: String,
    hidden: Vec<(String, String)>,
}

/// Logs in to the institutional proxy with a fresh cookie jar every time.
pub struct LibrarySessionManager {
    credentials: Credentials,
    settings: LoginSettings,
    next_id: AtomicU64,
}

impl LibrarySessionManager {
    pub fn new(credentials: Credentials, settings: LoginSettings) -> Self {
        Self {
            credentials,
            settings,
            next_id: AtomicU64::new(1),
        }
    }

    fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(&self.settings.user_agent)
            .cookie_store(true)
            .timeout(self.settings.wait)
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    async fn login(&self, client: &reqwest::Client) -> Result<()> {
        let page = client.get(&self.settings.login_url).send().await?;
        let page_url = page.url().clone();
        let html = page.text().await?;

        let form = parse_login_form(&html, &page_url, &self.settings)
            .inspect_err(|e| warn!(error = %e, "Login page did not contain the expected form"))?;
        debug!(action = %form.action, hidden = form.hidden.len(), "Submitting login form");

        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.hidden.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .append_pair(&form.username_field, &self.credentials.username)
            .append_pair(&form.password_field, &self.credentials.password)
            .finish();

        let response = client
            .post(form.action)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let landed = response.url().clone();
        if !landed.as_str().starts_with(&self.settings.authenticated_prefix) {
            return Err(DigestError::Auth(format!(
                "login landed on unexpected URL {}",
                landed
            )));
        }

        // A rejected login usually re-renders the form on the same domain.
        let landing_html = response.text().await?;
        if parse_login_form(&landing_html, &landed, &self.settings).is_ok() {
            return Err(DigestError::Auth("login form shown again after submit".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl SessionProvider for LibrarySessionManager {
    type Session = LibrarySession;

    async fn open(&self) -> Result<LibrarySession> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(session = id, url = %self.settings.login_url, "Logging in to library");

        let client = self.build_client()?;
        match tokio::time::timeout(self.settings.wait, self.login(&client)).await {
            Ok(Ok(())) => {
                info!(session = id, "Login successful");
                Ok(LibrarySession {
                    id,
                    client,
                    proxy_prefix: self.settings.proxy_prefix.clone(),
                })
            }
            Ok(Err(DigestError::Auth(msg))) => Err(DigestError::Auth(msg)),
            Ok(Err(e)) => Err(DigestError::Auth(e.to_string())),
            Err(_) => Err(DigestError::Auth(format!(
                "login did not complete within {:?}",
                self.settings.wait
            ))),
        }
    }

    async fn close(&self, session: LibrarySession) {
        // Dropping the client drops its cookie jar and connection pool.
        info!(session = session.id, "Closing library session");
        drop(session);
    }
}

/// Locate the login form holding both credential fields.
fn parse_login_form(html: &str, page_url: &Url, settings: &LoginSettings) -> Result<LoginForm> {
    let selector = |css: &str| {
        Selector::parse(css).map_err(|e| DigestError::Config(format!("Invalid selector '{}': {}", css, e)))
    };
    let form_selector = selector("form")?;
    let username_selector = selector(&settings.username_selector)?;
    let password_selector = selector(&settings.password_selector)?;
    let hidden_selector = selector("input[type=hidden]")?;

    let document = Html::parse_document(html);

    for form in document.select(&form_selector) {
        let (Some(user), Some(pass)) = (
            form.select(&username_selector).next(),
            form.select(&password_selector).next(),
        ) else {
            continue;
        };

        let field_name = |el: scraper::ElementRef<'_>, fallback: &str| {
            el.value()
                .attr("name")
                .or_else(|| el.value().attr("id"))
                .unwrap_or(fallback)
                .to_string()
        };

        let action = match form.value().attr("action").map(str::trim) {
            Some(a) if !a.is_empty() => page_url
                .join(a)
                .map_err(|e| DigestError::Auth(format!("invalid form action '{}': {}", a, e)))?,
            _ => page_url.clone(),
        };

        let hidden = form
            .select(&hidden_selector)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                Some((name.to_string(), input.value().attr("value").unwrap_or("").to_string()))
            })
            .collect();

        return Ok(LoginForm {
            action,
            username_field: field_name(user, "id"),
            password_field: field_name(pass, "password"),
            hidden,
        });
    }

    Err(DigestError::Auth(format!(
        "login form fields '{}' / '{}' not found on {}",
        settings.username_selector, settings.password_selector, page_url
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LoginSettings {
        LoginSettings {
            login_url: "https://library.example.ac.kr/login".to_string(),
            authenticated_prefix: "https://library.example.ac.kr/".to_string(),
            proxy_prefix: "https://access.example.ac.kr/link.n2s?url=".to_string(),
            username_selector: "#id".to_string(),
            password_selector: "#password".to_string(),
            user_agent: "test-agent".to_string(),
            wait: Duration::from_secs(5),
        }
    }

    fn login_url() -> Url {
        Url::parse("https://library.example.ac.kr/login").expect("valid url")
    }

    #[test]
    fn test_parse_login_form() {
        let html = r#"
            <form id="search" action="/search"><input id="q" name="q"></form>
            <form id="login" action="/login/process" method="post">
              <input type="hidden" name="returnUrl" value="/mypage">
              <input type="text" id="id" name="userId">
              <input type="password" id="password" name="userPw">
            </form>"#;

        let form = parse_login_form(html, &login_url(), &settings()).expect("form found");
        assert_eq!(form.action.as_str(), "https://library.example.ac.kr/login/process");
        assert_eq!(form.username_field, "userId");
        assert_eq!(form.password_field, "userPw");
        assert_eq!(form.hidden, vec![("returnUrl".to_string(), "/mypage".to_string())]);
    }

    #[test]
    fn test_form_without_action_posts_to_page() {
        let html = r#"<form><input id="id"><input id="password" type="password"></form>"#;
        let form = parse_login_form(html, &login_url(), &settings()).expect("form found");
        assert_eq!(form.action, login_url());
        assert_eq!(form.username_field, "id");
        assert_eq!(form.password_field, "password");
    }

    #[test]
    fn test_missing_fields_is_auth_error() {
        let html = "<html><body><p>Service unavailable</p></body></html>";
        assert!(matches!(
            parse_login_form(html, &login_url(), &settings()),
            Err(DigestError::Auth(_))
        ));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "student".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
