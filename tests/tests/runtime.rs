mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use labench_runtime::{LabenchRuntime, RuntimeError};
    use std::path::Path;

    fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("labench.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn end_to_end_run_writes_distribution() {
        let addr = init().await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("res.hgrm");
        let config = write_config(
            dir.path(),
            &format!(
                r#"
RequestRatePerSec: 50
Clients: 10
Duration: 2s
BaseLatency: 1ms
RequestTimeout: 1s
ReuseConnections: true
TightTicker: true
OutFile: {}
Request:
  URL: http://{addr}/delay/ms/2
"#,
                out.display()
            ),
        );

        let summary = LabenchRuntime::new().config(&config).run().await.unwrap();

        assert!((98..=100).contains(&summary.total_requests));
        assert_eq!(summary.error_count, 0);

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.starts_with("#[labench latency distribution"));
        assert!(written.contains("#[Mean"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn post_body_and_expected_status() {
        let addr = init().await;
        let dir = tempfile::tempdir().unwrap();
        let body = dir.path().join("body.json");
        std::fs::write(&body, r#"{"hello":"world"}"#).unwrap();
        let config = write_config(
            dir.path(),
            &format!(
                r#"
RequestRatePerSec: 20
Clients: 4
Duration: 1s
OutputJSON: true
OutFile: {}
Request:
  URL: http://{addr}/echo
  BodyFile: {}
  Headers:
    Content-Type: application/json
"#,
                dir.path().join("res.hgrm").display(),
                body.display()
            ),
        );

        let summary = LabenchRuntime::new().config(&config).run().await.unwrap();
        assert!(summary.total_requests >= 19);
        assert_eq!(summary.success_count, summary.total_requests);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unexpected_status_is_reported_per_request() {
        let addr = init().await;
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            &format!(
                r#"
RequestRatePerSec: 20
Clients: 4
Duration: 1s
OutFile: {}
Request:
  URL: http://{addr}/status/200
  ExpectedHTTPStatusCode: 204
"#,
                dir.path().join("res.hgrm").display()
            ),
        );

        let summary = LabenchRuntime::new().config(&config).run().await.unwrap();
        assert_eq!(summary.errors.unexpected_status, summary.total_requests);
    }

    #[tokio::test]
    async fn unknown_protocol_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "Duration: 1s\nProtocol: QUIC\nRequest:\n  URL: http://127.0.0.1:9/\n",
        );
        let res = LabenchRuntime::new().config(&config).run().await;
        assert!(matches!(res, Err(RuntimeError::Config(_))));
    }
}
