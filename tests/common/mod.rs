// Shared fixtures for integration tests: a scripted process runner, a local webhook
// receiver and a config rooted in a temporary directory.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    routing::post,
};
use provisio::{
    FileSystemAdapter, HttpHandler,
    config::models::ServerConfig,
    core::{Coordinator, Ports, ProvisioningOutcome, Signer},
    ports::{CommandOutput, CommandRunner, CommandSpec, ProcessResult},
};
use tempfile::TempDir;

pub const SECRET: &str = "integration-secret";

/// One recorded invocation, with start and end so overlap can be checked.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub started: Instant,
    pub finished: Instant,
    /// Site files present when a syntax check ran, with their contents
    pub sites_seen: Vec<(PathBuf, String)>,
}

/// Process runner answering from a script keyed by program name.
///
/// Unscripted programs exit 0. Every call is recorded.
#[derive(Default)]
pub struct FakeRunner {
    exit_codes: HashMap<String, i32>,
    delay: Duration,
    sites_dir: Option<PathBuf>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.exit_codes.insert(program.to_string(), 1);
        self
    }

    /// Make every command take this long.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Snapshot this directory whenever `nginx` runs.
    pub fn watching(mut self, sites_dir: &Path) -> Self {
        self.sites_dir = Some(sites_dir.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.program).collect()
    }

    fn snapshot(&self) -> Vec<(PathBuf, String)> {
        let Some(dir) = &self.sites_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .map(|path| {
                let contents = std::fs::read_to_string(&path).unwrap_or_default();
                (path, contents)
            })
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> ProcessResult<CommandOutput> {
        let started = Instant::now();
        let sites_seen = if spec.program == "nginx" {
            self.snapshot()
        } else {
            Vec::new()
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let code = self.exit_codes.get(&spec.program).copied().unwrap_or(0);

        self.calls.lock().unwrap().push(Invocation {
            program: spec.program.clone(),
            args: spec.args.clone(),
            started,
            finished: Instant::now(),
            sites_seen,
        });

        Ok(CommandOutput {
            status_code: Some(code),
            stdout: String::new(),
            stderr: if code == 0 {
                String::new()
            } else {
                format!("{}: [emerg] scripted failure", spec.program)
            },
        })
    }
}

/// A webhook delivery as the receiver saw it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub signature: Option<String>,
    pub body: Bytes,
}

impl Delivery {
    pub fn outcome(&self) -> ProvisioningOutcome {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Local axum server that records every POST to `/hook`.
pub struct WebhookReceiver {
    pub url: String,
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl WebhookReceiver {
    pub async fn start() -> Self {
        let deliveries: Arc<Mutex<Vec<Delivery>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(store): State<Arc<Mutex<Vec<Delivery>>>>,
                     headers: HeaderMap,
                     body: Bytes| async move {
                        let signature = headers
                            .get("x-signature")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        store.lock().unwrap().push(Delivery { signature, body });
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(deliveries.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/hook"),
            deliveries,
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

/// Config with every path under `root` and the default commands.
pub fn test_config(root: &Path) -> ServerConfig {
    let mut config = ServerConfig {
        webhook_secret: SECRET.to_string(),
        backend_origin: "http://127.0.0.1:3000".to_string(),
        ..Default::default()
    };
    config.proxy.sites_available_dir = root.join("sites-available");
    config.proxy.sites_enabled_dir = root.join("sites-enabled");
    config.certificates.store_dir = root.join("live");
    config.certificates.self_signed_dir = root.join("self-signed");
    config.webhook.timeout = Duration::from_secs(2);
    config
}

/// A router over real disk adapters in a temp dir, a fake runner and a real webhook client.
pub struct TestApp {
    pub dir: TempDir,
    pub config: ServerConfig,
    pub runner: Arc<FakeRunner>,
    pub coordinator: Arc<Coordinator>,
    pub router: Router,
    pub signer: Signer,
}

impl TestApp {
    pub fn new(runner: FakeRunner) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let runner = Arc::new(runner.watching(&config.proxy.sites_available_dir));
        let ports = Ports {
            runner: runner.clone(),
            webhook: Arc::new(
                provisio::ReqwestWebhookClient::new(config.webhook.timeout).unwrap(),
            ),
            file_system: Arc::new(FileSystemAdapter::new()),
        };
        let coordinator = Arc::new(Coordinator::new(&config, ports).unwrap());
        let router = HttpHandler::new(coordinator.clone()).router();

        Self {
            dir,
            config,
            runner,
            coordinator,
            router,
            signer: Signer::new(SECRET.as_bytes()).unwrap(),
        }
    }

    pub fn body(domain: &str, webhook_url: &str) -> String {
        serde_json::json!({
            "domain": domain,
            "userId": "user-42",
            "webhookUrl": webhook_url,
        })
        .to_string()
    }

    pub fn signed_request(&self, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/custom-domains/setup")
            .header("content-type", "application/json")
            .header("x-signature", self.signer.sign(body.as_bytes()))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn site_path(&self, domain: &str) -> PathBuf {
        self.config.proxy.sites_available_dir.join(domain)
    }

    pub fn enabled_path(&self, domain: &str) -> PathBuf {
        self.config.proxy.sites_enabled_dir.join(domain)
    }

    pub fn certificate_dir(&self, domain: &str) -> PathBuf {
        self.config.certificates.store_dir.join(domain)
    }

    pub fn self_signed_dir(&self, domain: &str) -> PathBuf {
        self.config.certificates.self_signed_dir.join(domain)
    }

    /// True when nothing at all was written under the temp root.
    pub fn root_is_untouched(&self) -> bool {
        std::fs::read_dir(self.dir.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
    }
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
