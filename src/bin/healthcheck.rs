//! Container liveness check for the Bot API server.

use std::process::ExitCode;
use std::time::Duration;

const DEFAULT_URL: &str = "http://localhost:8081/health";
const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let url = std::env::var("HEALTHCHECK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());

    match check(&url, TIMEOUT).await {
        Ok(()) => {
            println!("✅ Bot API server is healthy");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn check(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await?;
    if response.status() != reqwest::StatusCode::OK {
        anyhow::bail!("HTTP status {}", response.status());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_answering(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn ok_status_is_healthy() {
        let server = server_answering(200).await;
        let url = format!("{}/health", server.uri());

        assert!(check(&url, TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn unavailable_status_is_unhealthy() {
        let server = server_answering(503).await;
        let url = format!("{}/health", server.uri());

        let err = check(&url, TIMEOUT).await.unwrap_err();
        assert!(err.to_string().contains("503"), "{err:#}");
    }

    #[tokio::test]
    async fn refused_connection_is_unhealthy() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(check(&format!("http://{addr}/health"), TIMEOUT).await.is_err());
    }

    #[tokio::test]
    async fn slow_server_is_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let url = format!("{}/health", server.uri());

        assert!(check(&url, Duration::from_millis(200)).await.is_err());
    }
}
