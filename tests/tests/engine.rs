mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use labench::prelude::*;
    use reqwest::Client;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn steady_rate_against_delay_endpoint() {
        let addr = init().await;
        let action = get(Client::new(), format!("http://{addr}/delay/ms/5"));

        let spec = BenchmarkSpec::new(100, 20, Duration::from_secs(3))
            .warm_up(Duration::from_secs(1))
            .base_latency(Duration::from_millis(1));
        let summary = Benchmark::new(spec, action)
            .run(CancelSignal::never(), ReportFormat::Text, Pacing::Precise)
            .await
            .unwrap();
        println!("{summary}");

        assert!(!summary.interrupted);
        assert!((295..=300).contains(&summary.total_requests));
        assert_eq!(summary.error_count, 0);
        assert!((95..=100).contains(&summary.warm_up_requests));
        assert!(summary.latency(0.5) >= Duration::from_millis(5));
        assert!(summary.latency(0.5) < Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn server_errors_are_counted_not_fatal() {
        let addr = init().await;
        let action = get(Client::new(), format!("http://{addr}/status/503"));

        let spec = BenchmarkSpec::new(50, 10, Duration::from_secs(1));
        let summary = Benchmark::new(spec, action)
            .run(CancelSignal::never(), ReportFormat::Json, Pacing::Coarse)
            .await
            .unwrap();

        assert!(summary.total_requests >= 45);
        assert_eq!(summary.errors.unexpected_status, summary.total_requests);
        assert_eq!(summary.success_count, 0);
        assert!(summary.histogram.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn slow_responses_time_out() {
        let addr = init().await;
        let action = get(Client::new(), format!("http://{addr}/delay/ms/2000"));

        let spec = BenchmarkSpec::new(10, 20, Duration::from_secs(1))
            .request_timeout(Duration::from_millis(200));
        let summary = Benchmark::new(spec, action)
            .run(CancelSignal::never(), ReportFormat::Text, Pacing::Precise)
            .await
            .unwrap();

        assert!(summary.total_requests >= 9);
        assert_eq!(summary.errors.timeout, summary.total_requests);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn rate_limited_service_rejects_excess() {
        let addr = init().await;
        let action = get(Client::new(), format!("http://{addr}/limited/50/delay/ms/1"));

        let spec = BenchmarkSpec::new(200, 20, Duration::from_secs(2));
        let summary = Benchmark::new(spec, action)
            .run(CancelSignal::never(), ReportFormat::Text, Pacing::Precise)
            .await
            .unwrap();

        assert!(summary.success_count > 0);
        assert!(summary.errors.unexpected_status > summary.success_count);
        assert_eq!(
            summary.success_count + summary.error_count,
            summary.total_requests
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn cancellation_mid_run() {
        let addr = init().await;
        let action = get(Client::new(), format!("http://{addr}/delay/ms/1"));

        let (handle, cancel) = cancellation();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            handle.cancel();
        });

        let spec = BenchmarkSpec::new(100, 10, Duration::from_secs(60));
        let summary = Benchmark::new(spec, action)
            .run(cancel, ReportFormat::Text, Pacing::Precise)
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert!((140..=160).contains(&summary.total_requests));
        assert!(summary.elapsed < Duration::from_secs(3));
    }
}
