use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::RenderSession;
use crate::error::RenderError;

/// W3C element reference key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const GATE_SELECTOR: &str = ".enter-btn";
const MARKER_XPATH: &str = "//a[contains(text(), '.torrent')]";
const DRIVER_READY_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DriverOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub poll_interval: Duration,
    /// Upper bound on any single WebDriver request, page loads included.
    pub request_timeout: Duration,
}

fn http_client(timeout: Duration) -> Result<Client, RenderError> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()?;
    Ok(client)
}

/// A chromedriver child process started for this run. Killed on drop.
pub struct DriverProcess {
    child: Child,
}

impl DriverProcess {
    pub async fn spawn(executable: &Path, webdriver_url: &str) -> Result<Self, RenderError> {
        let port = Url::parse(webdriver_url)
            .ok()
            .and_then(|u| u.port_or_known_default())
            .ok_or_else(|| RenderError::Protocol(format!("no port in {webdriver_url}")))?;

        let child = Command::new(executable)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(executable = ?executable, port, "Started chromedriver");

        let driver = DriverProcess { child };
        wait_until_ready(&http_client(STATUS_PROBE_TIMEOUT)?, webdriver_url).await?;
        Ok(driver)
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop chromedriver: {}", e);
        }
    }
}

async fn wait_until_ready(client: &Client, base: &str) -> Result<(), RenderError> {
    let url = format!("{}/status", base.trim_end_matches('/'));
    let deadline = Instant::now() + DRIVER_READY_TIMEOUT;
    loop {
        if let Ok(resp) = client.get(&url).send().await {
            if let Ok(body) = resp.json::<Value>().await {
                if body["value"]["ready"].as_bool() == Some(true) {
                    return Ok(());
                }
            }
        }
        if Instant::now() >= deadline {
            return Err(RenderError::Timeout(DRIVER_READY_TIMEOUT, "chromedriver"));
        }
        sleep(Duration::from_millis(250)).await;
    }
}

/// Headless Chrome driven over the WebDriver HTTP protocol.
pub struct WebDriverSession {
    client: Client,
    base: String,
    session_id: String,
    poll: Duration,
}

impl WebDriverSession {
    pub async fn start(opts: &DriverOptions) -> Result<Self, RenderError> {
        let client = http_client(opts.request_timeout)?;
        let base = opts.webdriver_url.trim_end_matches('/').to_string();

        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("user-agent={}", opts.user_agent),
        ];
        if opts.headless {
            args.insert(0, "--headless".to_string());
        }
        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let value = send(&client, Method::POST, &format!("{base}/session"), Some(caps)).await?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| RenderError::Protocol(format!("no sessionId in {value}")))?
            .to_string();
        info!(session = %session_id, "WebDriver session started");

        Ok(WebDriverSession { client, base, session_id, poll: opts.poll_interval })
    }

    /// End the browser session.
    pub async fn quit(self) -> Result<(), RenderError> {
        let url = format!("{}/session/{}", self.base, self.session_id);
        send(&self.client, Method::DELETE, &url, None).await?;
        info!(session = %self.session_id, "WebDriver session closed");
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, RenderError> {
        let url = format!("{}/session/{}{}", self.base, self.session_id, path);
        send(&self.client, method, &url, body).await
    }

    /// Element id for the first match, `None` when nothing matches yet.
    async fn find(&self, using: &str, value: &str) -> Result<Option<String>, RenderError> {
        let body = json!({ "using": using, "value": value });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(v) => v[ELEMENT_KEY]
                .as_str()
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| RenderError::Protocol(format!("no element reference in {v}"))),
            Err(RenderError::WebDriver { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn element_flag(&self, id: &str, flag: &str) -> Result<bool, RenderError> {
        let v = self.command(Method::GET, &format!("/element/{id}/{flag}"), None).await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn clickable(&self, selector: &str) -> Result<Option<String>, RenderError> {
        let Some(id) = self.find("css selector", selector).await? else {
            return Ok(None);
        };
        let ready = self.element_flag(&id, "displayed").await? && self.element_flag(&id, "enabled").await?;
        Ok(ready.then_some(id))
    }

    /// Re-run `probe` every poll interval until it yields a value or `timeout` passes.
    async fn poll_until<T, F, Fut>(&self, what: &'static str, timeout: Duration, mut probe: F) -> Result<T, RenderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, RenderError>>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = probe().await? {
                return Ok(found);
            }
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout(timeout, what));
            }
            sleep(self.poll).await;
        }
    }
}

impl RenderSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    async fn unlock(&mut self, timeout: Duration) -> Result<(), RenderError> {
        let this = &*self;
        let id = this
            .poll_until("gate control", timeout, || this.clickable(GATE_SELECTOR))
            .await?;
        debug!("Gate control found, clicking");
        this.command(Method::POST, &format!("/element/{id}/click"), Some(json!({})))
            .await?;
        info!("Gate control clicked");
        Ok(())
    }

    async fn wait_for_marker(&mut self, timeout: Duration) -> Result<(), RenderError> {
        let this = &*self;
        this.poll_until("artifact link", timeout, || this.find("xpath", MARKER_XPATH))
            .await?;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        let v = self.command(Method::GET, "/source", None).await?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| RenderError::Protocol("page source is not a string".into()))
    }
}

/// Issue one WebDriver request and unwrap its `value` member.
async fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, RenderError> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let mut payload: Value = resp.json().await?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }
    Err(RenderError::WebDriver {
        error: value["error"].as_str().unwrap_or("unknown error").to_string(),
        message: value["message"].as_str().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn hung_driver_request_times_out() {
        let opts = DriverOptions {
            webdriver_url: silent_server().await,
            headless: true,
            user_agent: "test".into(),
            poll_interval: Duration::from_millis(10),
            request_timeout: Duration::from_millis(200),
        };

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(10), WebDriverSession::start(&opts))
            .await
            .expect("request was not bounded");
        match result {
            Err(RenderError::Http(e)) => assert!(e.is_timeout(), "unexpected error: {e}"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("session started against a silent server"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
