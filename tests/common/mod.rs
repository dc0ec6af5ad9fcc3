use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;

/// Secret handed to the spawned server; tests mint their own tokens with it.
pub const TEST_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<Option<TestServer>> = OnceLock::new();

pub struct TestServer {
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests.
        // Assumes debug profile; adjust if you run tests with --release.
        let mut cmd = Command::new("target/debug/tigerlilly-api");
        cmd.env("PORT", port.to_string())
            .env("SECRET_KEY", TEST_SECRET)
            .env(
                "UPLOAD_PATH",
                std::env::temp_dir().join("tigerlilly-test-icons"),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // DATABASE_URL is inherited from the environment
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

/// Spawn (once) and return the shared server, or `None` when no database is
/// configured - callers should skip in that case rather than fail.
pub async fn ensure_server() -> Result<Option<&'static TestServer>> {
    if std::env::var("DATABASE_URL").is_err() {
        return Ok(None);
    }

    let server = SERVER
        .get_or_init(|| Some(TestServer::spawn().expect("failed to spawn server binary")))
        .as_ref()
        .expect("server slot initialized empty");
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(Some(server))
}

/// A stateless admin token; the guards trust the signature alone.
pub fn admin_token() -> String {
    tigerlilly_api::auth::create_token(1, "admin_test", true, TEST_SECRET).expect("token")
}

/// Process-unique suffix so fixtures survive reruns against the same database.
pub fn unique(tag: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    format!("{tag}-{nanos}")
}
