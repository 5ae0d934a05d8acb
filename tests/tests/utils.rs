use labench::RequestError;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Installs logging and the metrics recorder once, then starts a fresh mock service for the
/// calling test. Each test runs on its own runtime, so every test needs its own server.
#[allow(unused)]
pub async fn init() -> SocketAddr {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("labench=debug,labench_runtime=debug,mock_service=info")
            .init();

        if let Err(err) = PrometheusBuilder::new().install_recorder() {
            error!("Unable to install metrics recorder: {err}");
        }
    });

    mock_service::spawn("127.0.0.1:0".parse().unwrap())
        .await
        .expect("mock service failed to start")
}

/// Request action that GETs `url` and expects a 200.
#[allow(unused)]
pub fn get(
    client: Client,
    url: String,
) -> impl labench::RequestAction + Clone {
    move || {
        let client = client.clone();
        let url = url.clone();
        async move {
            let res = client
                .get(url)
                .send()
                .await
                .map_err(|err| RequestError::Transport(err.to_string()))?;
            let status = res.status().as_u16();
            res.bytes()
                .await
                .map_err(|err| RequestError::Transport(err.to_string()))?;
            if status == 200 {
                Ok(())
            } else {
                Err(RequestError::UnexpectedStatus {
                    expected: 200,
                    actual: status,
                })
            }
        }
    }
}
