//! Shared utilities for end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use social_api::auth::PasswordHasher;
use social_api::config::{ForumConfig, SeedUser};
use social_api::http::HttpServer;
use social_api::lifecycle::Components;
use social_api::mail::{ActivationMail, LogMailer, MailError, Mailer};
use social_api::store::InMemoryStore;
use tokio::net::TcpListener;

pub const PASSWORD: &str = "password";

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const MODERATOR: i64 = 3;
pub const ADMIN: i64 = 4;

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<InMemoryStore>,
    pub client: reqwest::Client,
    components: Components,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A freshly issued token for `user_id`.
    pub fn token(&self, user_id: i64) -> String {
        self.components.gate.authenticator().issue(user_id)
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    pub async fn get(&self, path: &str, user_id: Option<i64>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(id) = user_id {
            req = req.bearer_auth(self.token(id));
        }
        req.send().await.expect("server unreachable")
    }

    pub async fn shutdown(self) {
        self.components.close().await;
    }
}

/// Keeps every activation mail it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<ActivationMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<ActivationMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Refuses every mail.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_activation(&self, _mail: &ActivationMail) -> Result<(), MailError> {
        Err(MailError::Delivery("smtp unavailable".into()))
    }
}

fn seed(id: i64, username: &str, role: &str) -> SeedUser {
    SeedUser {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: PASSWORD.to_string(),
        role: role.to_string(),
    }
}

/// Default test configuration: generous rate limit, identity cache on.
pub fn test_config() -> ForumConfig {
    let mut config = ForumConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.token.secret = "integration-secret".to_string();
    config.auth.token.host = "social.test".to_string();
    config.rate_limit.requests_per_window = 10_000;
    config.rate_limit.window_secs = 60;
    config.cache.enabled = true;
    config.auth.password.memory_kib = 64;
    config.auth.password.iterations = 1;
    config.store.seed = vec![
        seed(ALICE, "alice", "user"),
        seed(BOB, "bob", "user"),
        seed(MODERATOR, "mod", "moderator"),
        seed(ADMIN, "admin", "admin"),
    ];
    config
}

/// Start a server with `test_config` adjusted by `configure`.
pub async fn spawn_server(configure: impl FnOnce(&mut ForumConfig)) -> TestServer {
    spawn_server_with_mailer(Arc::new(LogMailer), configure).await
}

/// `spawn_server` with a chosen mail collaborator.
pub async fn spawn_server_with_mailer(
    mailer: Arc<dyn Mailer>,
    configure: impl FnOnce(&mut ForumConfig),
) -> TestServer {
    let mut config = test_config();
    configure(&mut config);

    let hasher = PasswordHasher::from_config(&config.auth.password).expect("password cost");
    let store = Arc::new(InMemoryStore::from_seed(&config.store.seed, hasher).expect("seed"));
    let components = Components::with_collaborators(config, store.clone(), mailer).expect("components");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let server = HttpServer::new(components.app_state(), &components.config);
    let shutdown = components.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, shutdown).await;
    });

    let client = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client");

    TestServer {
        addr,
        store,
        client,
        components,
    }
}
