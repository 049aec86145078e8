//! Scrape stage against a local mock of the library login and proxy.

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use paperdigest::{
    delay::{DelayPolicy, NoDelay},
    models::WorkItem,
    retry::{ItemState, RetryOrchestrator},
    session::{Credentials, LibrarySessionManager, LoginSettings, SessionProvider},
    storage::ArtifactStore,
    worker::{ArticleWorker, Fetcher},
    DigestError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const LOGIN_PAGE: &str = r#"<html><body>
<form id="loginForm" action="/login" method="post">
  <input type="hidden" name="returnUrl" value="/home">
  <input type="text" id="id" name="userId">
  <input type="password" id="password" name="userPw">
  <button type="submit">Login</button>
</form>
</body></html>"#;

/// Counts how many pauses the worker asked for
#[derive(Clone, Default)]
struct CountingDelay(Arc<AtomicUsize>);

impl CountingDelay {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl DelayPolicy for CountingDelay {
    fn next_delay(&self) -> Duration {
        self.0.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    }
}

#[derive(Default)]
struct MockLibrary {
    logins: AtomicUsize,
    fetches: AtomicUsize,
    /// Remaining failures per article PII
    failures: Mutex<HashMap<String, u32>>,
}

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

async fn login_submit(
    State(library): State<Arc<MockLibrary>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let valid = fields.get("userId").map(String::as_str) == Some("student")
        && fields.get("userPw").map(String::as_str) == Some("correct-horse")
        && fields.get("returnUrl").map(String::as_str) == Some("/home");
    if !valid {
        return Redirect::to("/login?error=1").into_response();
    }
    let n = library.logins.fetch_add(1, Ordering::SeqCst) + 1;
    (
        [(header::SET_COOKIE, format!("sid=session-{}; Path=/", n))],
        Redirect::to("/home"),
    )
        .into_response()
}

async fn slow_login_page() -> Html<&'static str> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Html(LOGIN_PAGE)
}

async fn home() -> Html<&'static str> {
    Html("<html><body><h1>My Library</h1></body></html>")
}

fn article_page(title: &str) -> String {
    let paragraphs = format!(
        "<p>{} shows how occupant behaviour shapes measured building energy use [4].</p>",
        title
    )
    .repeat(80);
    format!(
        r#"<html><body><div id="body"><div>
<section><h2>Introduction</h2>{}</section>
<section><h2>Conclusions</h2><p>Findings hold across climates.</p><figure>Fig. 1</figure></section>
</div></div></body></html>"#,
        paragraphs
    )
}

async fn proxy(
    State(library): State<Arc<MockLibrary>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let has_session = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains("sid=session-"));
    if !has_session {
        return (StatusCode::FORBIDDEN, "login required").into_response();
    }

    library.fetches.fetch_add(1, Ordering::SeqCst);
    let target = params.get("url").cloned().unwrap_or_default();
    let pii = target.rsplit('/').next().unwrap_or_default().to_string();

    let fail = {
        let mut failures = library.failures.lock().expect("lock");
        match failures.get_mut(&pii) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    };
    if fail {
        return Html("<html><body><p>Access denied by publisher</p></body></html>".to_string())
            .into_response();
    }
    Html(article_page(&pii)).into_response()
}

async fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "proxy overloaded").into_response()
}

async fn stalled() -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Html(article_page("late")).into_response()
}

async fn start_mock(library: Arc<MockLibrary>) -> String {
    let app = Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/slow-login", get(slow_login_page))
        .route("/home", get(home))
        .route("/link", get(proxy))
        .route("/unavailable", get(unavailable))
        .route("/stall", get(stalled))
        .with_state(library);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

fn settings(base: &str) -> LoginSettings {
    LoginSettings {
        login_url: format!("{}/login", base),
        authenticated_prefix: format!("{}/home", base),
        proxy_prefix: format!("{}/link?url=", base),
        username_selector: "#id".to_string(),
        password_selector: "#password".to_string(),
        user_agent: "paperdigest-test".to_string(),
        wait: Duration::from_secs(5),
    }
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        username: "student".to_string(),
        password: password.to_string(),
    }
}

fn work_item(n: u32) -> WorkItem {
    WorkItem {
        id: format!("j.enbuild.2024.{}", n),
        url: format!("https://www.sciencedirect.com/science/article/pii/S03787788240{}", n),
        title: format!("Article {}", n),
        venue: "Energy and Buildings".to_string(),
        date: "2024-05-01".to_string(),
        first_author: "Han D.".to_string(),
    }
}

#[tokio::test]
async fn test_failed_item_recreates_session_and_succeeds() {
    let library = Arc::new(MockLibrary::default());
    library
        .failures
        .lock()
        .expect("lock")
        .insert("S037877882402".to_string(), 2);
    let base = start_mock(Arc::clone(&library)).await;

    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path()).expect("store");
    let provider = LibrarySessionManager::new(credentials("correct-horse"), settings(&base));
    let delay = CountingDelay::default();
    let worker = ArticleWorker::new(store.clone(), Box::new(delay.clone()), Duration::from_secs(5))
        .expect("worker");

    let items = vec![work_item(1), work_item(2), work_item(3)];
    let report = RetryOrchestrator::new(provider, worker, store.clone())
        .with_max_retries(3)
        .run(&items)
        .await;

    let attempts: Vec<u32> = report.outcomes.iter().map(|o| o.state.attempts()).collect();
    assert_eq!(attempts, vec![1, 3, 1]);
    assert_eq!(report.committed(), 3);
    assert_eq!(report.sessions_opened, 3);
    assert_eq!(report.session_recreations, 2);
    assert_eq!(library.logins.load(Ordering::SeqCst), 3);
    assert_eq!(library.fetches.load(Ordering::SeqCst), 5);
    assert_eq!(delay.count(), 5);
    assert_eq!(report.total_attempts(), 5);

    let documents = store.documents().expect("list");
    assert_eq!(documents.len(), 3);
    let text = std::fs::read_to_string(store.document_path("j.enbuild.2024.2")).expect("doc");
    assert!(text.starts_with("Title: Article 2"));
    assert!(!text.contains("[4]"));
    assert!(!text.contains("Fig. 1"));
}

#[tokio::test]
async fn test_exhausted_item_is_skipped_without_artifact() {
    let library = Arc::new(MockLibrary::default());
    library
        .failures
        .lock()
        .expect("lock")
        .insert("S037877882401".to_string(), 10);
    let base = start_mock(Arc::clone(&library)).await;

    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path()).expect("store");
    let provider = LibrarySessionManager::new(credentials("correct-horse"), settings(&base));
    let worker = ArticleWorker::new(store.clone(), Box::new(NoDelay), Duration::from_secs(5))
        .expect("worker");

    let items = vec![work_item(1), work_item(2)];
    let report = RetryOrchestrator::new(provider, worker, store.clone())
        .with_max_retries(2)
        .run(&items)
        .await;

    assert!(matches!(
        report.outcomes[0].state,
        ItemState::Failed { attempts: 2, .. }
    ));
    assert!(matches!(report.outcomes[1].state, ItemState::Succeeded { attempts: 1, .. }));
    assert_eq!(report.failed_ids(), vec!["j.enbuild.2024.1"]);
    assert!(!store.document_path("j.enbuild.2024.1").exists());
    assert_eq!(store.documents().expect("list").len(), 1);
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let library = Arc::new(MockLibrary::default());
    let base = start_mock(Arc::clone(&library)).await;

    let provider = LibrarySessionManager::new(credentials("wrong"), settings(&base));
    let err = provider.open().await.expect_err("login must fail");

    assert!(matches!(err, DigestError::Auth(_)));
    assert_eq!(library.logins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_fetch_still_pauses() {
    let library = Arc::new(MockLibrary::default());
    let base = start_mock(Arc::clone(&library)).await;

    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path()).expect("store");
    let mut login = settings(&base);
    login.proxy_prefix = format!("{}/unavailable?url=", base);
    let provider = LibrarySessionManager::new(credentials("correct-horse"), login);
    let delay = CountingDelay::default();
    let worker = ArticleWorker::new(store.clone(), Box::new(delay.clone()), Duration::from_secs(5))
        .expect("worker");

    let session = provider.open().await.expect("login");
    let err = worker.fetch(&session, &work_item(1)).await.expect_err("503");
    assert!(matches!(err, DigestError::Api { code: 503, .. }));
    assert_eq!(delay.count(), 1);
    provider.close(session).await;

    let report = RetryOrchestrator::new(provider, worker, store.clone())
        .with_max_retries(3)
        .run(&[work_item(1)])
        .await;

    assert!(matches!(
        report.outcomes[0].state,
        ItemState::Failed { attempts: 3, .. }
    ));
    assert_eq!(delay.count(), 4);
    assert_eq!(library.logins.load(Ordering::SeqCst), 4);
    assert!(store.documents().expect("list").is_empty());
}

#[tokio::test]
async fn test_content_wait_expiry_is_content_not_found() {
    let library = Arc::new(MockLibrary::default());
    let base = start_mock(Arc::clone(&library)).await;

    let dir = TempDir::new().expect("tempdir");
    let store = ArtifactStore::new(dir.path()).expect("store");
    let mut login = settings(&base);
    login.proxy_prefix = format!("{}/stall?url=", base);
    let provider = LibrarySessionManager::new(credentials("correct-horse"), login);
    let delay = CountingDelay::default();
    let worker = ArticleWorker::new(store.clone(), Box::new(delay.clone()), Duration::from_millis(200))
        .expect("worker");

    let session = provider.open().await.expect("login");
    let started = std::time::Instant::now();
    let err = worker.fetch(&session, &work_item(7)).await.expect_err("page too slow");

    assert!(matches!(err, DigestError::ContentNotFound { ref id } if id == "j.enbuild.2024.7"));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(delay.count(), 1);
    assert!(store.documents().expect("list").is_empty());
}

#[tokio::test]
async fn test_slow_login_is_auth_error() {
    let library = Arc::new(MockLibrary::default());
    let base = start_mock(Arc::clone(&library)).await;

    let mut login = settings(&base);
    login.login_url = format!("{}/slow-login", base);
    login.wait = Duration::from_millis(300);
    let provider = LibrarySessionManager::new(credentials("correct-horse"), login);

    let started = std::time::Instant::now();
    let err = provider.open().await.expect_err("login too slow");

    assert!(matches!(err, DigestError::Auth(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(library.logins.load(Ordering::SeqCst), 0);
}
