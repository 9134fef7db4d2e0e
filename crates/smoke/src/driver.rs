//! Driver management - spawning and health checking chromedriver

use serde::Deserialize;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::DriverConfig;
use crate::error::{SmokeError, SmokeResult};

/// Handle to a running chromedriver process
pub struct DriverProcess {
    child: Child,
    pub url: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    message: String,
}

impl DriverProcess {
    /// Spawn the driver binary and wait until it accepts sessions
    pub async fn spawn(config: &DriverConfig) -> SmokeResult<Self> {
        if !config.binary_path.exists() {
            return Err(SmokeError::DriverNotFound(config.binary_path.clone()));
        }

        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let child = Command::new(&config.binary_path)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SmokeError::DriverStartup(format!(
                    "Failed to spawn {}: {}",
                    config.binary_path.display(),
                    e
                ))
            })?;

        let mut handle = DriverProcess { child, url, port };

        if let Err(e) = handle.wait_for_ready(config.startup_timeout()).await {
            let _ = handle.stop();
            return Err(e);
        }

        info!("Driver is ready at {}", handle.url);
        Ok(handle)
    }

    /// Poll `/status` until the driver reports ready
    async fn wait_for_ready(&mut self, timeout_duration: Duration) -> SmokeResult<()> {
        let status_url = format!("{}/status", self.url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            // A driver that exits here is usually a browser/driver version mismatch
            if let Some(status) = self.child.try_wait()? {
                return Err(SmokeError::DriverStartup(format!(
                    "driver exited with {} before becoming ready",
                    status
                )));
            }

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<StatusResponse>().await {
                    Ok(body) if body.value.ready => return Ok(()),
                    Ok(body) => warn!("Driver not ready: {}", body.value.message),
                    Err(e) => warn!("Unreadable driver status: {}", e),
                },
                Ok(resp) => {
                    warn!("Driver status returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for driver to start...");
                    }
                    if !e.is_connect() {
                        warn!("Driver status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(SmokeError::DriverStartup(format!(
            "no ready status from {} after {} attempts",
            status_url, attempts
        )))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the driver
    pub fn stop(&mut self) -> SmokeResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        info!("Stopping driver (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Find a free port to use
fn find_free_port() -> SmokeResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
