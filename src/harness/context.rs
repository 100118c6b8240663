//! Per-test setup and teardown.

use std::time::Duration;

use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::client::invoker::{HttpInvoker, RemoteInvoker};
use crate::client::types::{InvokeResponse, LraError, LraResult};
use crate::config::schema::TckConfig;
use crate::lifecycle::LraClientOps;

/// Outcome of a test's teardown.
#[derive(Debug)]
pub struct TestReport {
    pub test_name: String,
    pub run_id: Uuid,
    /// LRAs that were still open and got cancelled by the teardown.
    pub leaked: usize,
    /// Errors raised on the timer worker during the test.
    pub background_errors: Vec<LraError>,
}

impl TestReport {
    /// True when nothing leaked and no timer fired.
    pub fn is_clean(&self) -> bool {
        self.leaked == 0 && self.background_errors.is_empty()
    }
}

/// State of one running test.
pub struct TckContext<I: RemoteInvoker> {
    suite: String,
    test_name: String,
    run_id: Uuid,
    config: TckConfig,
    ops: LraClientOps<I>,
    span: Span,
}

impl TckContext<HttpInvoker> {
    /// Set up a test against the configured HTTP target.
    pub fn before_http(suite: &str, test_name: &str, config: TckConfig) -> LraResult<Self> {
        let invoker = HttpInvoker::new(&config.target, &config.paths)?;
        Ok(Self::before(suite, test_name, config, invoker))
    }
}

impl<I: RemoteInvoker> TckContext<I> {
    /// Set up a test. Must be called inside a Tokio runtime.
    ///
    /// Opens a `tck_test` span carrying the suite, test name and run id. The
    /// timer worker runs inside it, so timeout cancellations are tagged with
    /// the test that leaked them.
    pub fn before(suite: &str, test_name: &str, config: TckConfig, invoker: I) -> Self {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("tck_test", suite, test = test_name, run_id = %run_id);

        let ops = span.in_scope(|| {
            tracing::info!("Running test");
            LraClientOps::new(invoker, config.paths.clone())
        });
        Self {
            suite: suite.to_string(),
            test_name: test_name.to_string(),
            run_id,
            config,
            ops,
            span,
        }
    }

    /// Client id for LRAs started by this test: `<Suite>#<test>`.
    pub fn client_id(&self) -> String {
        format!("{}#{}", self.suite, self.test_name)
    }

    /// The configured default LRA timeout, scaled by the timeout factor.
    pub fn lra_timeout(&self) -> LraResult<Duration> {
        self.config.timeouts.default_duration()
    }

    /// Scale a test specific timeout by the configured factor.
    pub fn adjust(&self, timeout: Duration) -> Duration {
        self.config.timeouts.adjust(timeout)
    }

    pub fn ops(&self) -> &LraClientOps<I> {
        &self.ops
    }

    pub fn config(&self) -> &TckConfig {
        &self.config
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The span opened by [`Self::before`]; instrument test bodies with it
    /// to tag their logs with the run id.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Tear the test down: cancel leaked LRAs, collect timer errors, stop the
    /// timer worker.
    pub async fn after(self) -> TestReport {
        let span = self.span.clone();
        self.teardown().instrument(span).await
    }

    async fn teardown(self) -> TestReport {
        let leaked = self.ops.clean_up(&self.test_name).await;
        let background_errors = self.ops.background_errors();
        self.ops.shutdown().await;

        let report = TestReport {
            test_name: self.test_name,
            run_id: self.run_id,
            leaked,
            background_errors,
        };
        if report.is_clean() {
            tracing::info!("Test finished");
        } else {
            tracing::warn!(
                leaked = report.leaked,
                timer_errors = report.background_errors.len(),
                "Test finished with leaked or timed out LRAs"
            );
        }
        report
    }
}

/// Fail unless `response` carries the `expected` status.
pub fn check_status(expected: u16, response: &InvokeResponse, path: &str) -> LraResult<()> {
    if response.status == expected {
        Ok(())
    } else {
        Err(LraError::UnexpectedStatus {
            path: path.to_string(),
            expected,
            actual: response.status,
        })
    }
}

/// [`check_status`], returning the body on success.
pub fn check_status_read(expected: u16, response: InvokeResponse, path: &str) -> LraResult<String> {
    check_status(expected, &response, path)?;
    Ok(response.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    use crate::client::types::LraId;

    struct Coordinator;

    #[async_trait]
    impl RemoteInvoker for Coordinator {
        async fn invoke(
            &self,
            _lra: Option<&LraId>,
            _base_path: &str,
            path: &str,
            coerce_status: u16,
        ) -> LraResult<InvokeResponse> {
            let body = if path == "start-dont-end" {
                format!("http://coordinator.test/lra/{}", Uuid::new_v4())
            } else {
                String::new()
            };
            Ok(InvokeResponse {
                status: coerce_status,
                body,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_id_and_timeout() {
        let mut config = TckConfig::default();
        config.timeouts.timeout_factor = 2.0;
        let ctx = TckContext::before("TckTests", "closeTest", config, Coordinator);

        assert_eq!(ctx.client_id(), "TckTests#closeTest");
        assert_eq!(ctx.lra_timeout().unwrap(), Duration::from_secs(20));
        assert_eq!(ctx.adjust(Duration::from_secs(1)), Duration::from_secs(2));

        let report = ctx.after().await;
        assert!(report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_reports_leaks() {
        let ctx = TckContext::before("TckTests", "leaky", TckConfig::default(), Coordinator);
        let client_id = ctx.client_id();
        let timeout = ctx.lra_timeout().unwrap();

        ctx.ops().start_lra(None, &client_id, timeout).await.unwrap();
        ctx.ops().start_lra(None, &client_id, timeout).await.unwrap();
        let closed = ctx.ops().start_lra(None, &client_id, timeout).await.unwrap();
        ctx.ops().close_lra(&closed).await.unwrap();

        let report = ctx.after().await;
        assert_eq!(report.leaked, 2);
        assert!(report.background_errors.is_empty());
        assert!(!report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_reports_timer_errors() {
        let ctx = TckContext::before("TckTests", "slow", TckConfig::default(), Coordinator);
        ctx.ops()
            .start_lra(None, &ctx.client_id(), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = ctx.after().await;
        assert_eq!(report.leaked, 0);
        assert_eq!(report.background_errors.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_carry_run_id() {
        let ctx = TckContext::before("TckTests", "tagged", TckConfig::default(), Coordinator);
        let run_id = ctx.run_id().to_string();
        ctx.ops()
            .start_lra(None, &ctx.client_id(), Duration::from_millis(5))
            .await
            .unwrap();
        ctx.ops()
            .start_lra(None, &ctx.client_id(), Duration::from_secs(3600))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = ctx.after().await;
        assert_eq!(report.leaked, 1);

        for message in [
            "Running test",
            "cancelling LRA from the timer",
            "Test didn't finish LRA",
            "Test finished with leaked or timed out LRAs",
        ] {
            logs_assert(|lines: &[&str]| {
                match lines.iter().find(|line| line.contains(message)) {
                    Some(line) if line.contains(&run_id) => Ok(()),
                    Some(line) => Err(format!("run id missing from: {}", line)),
                    None => Err(format!("no log line for: {}", message)),
                }
            });
        }
    }

    #[test]
    fn test_check_status() {
        let ok = InvokeResponse {
            status: 200,
            body: "http://c/lra/1".into(),
        };
        assert!(check_status(200, &ok, "start-dont-end").is_ok());
        assert_eq!(check_status_read(200, ok.clone(), "start-dont-end").unwrap(), "http://c/lra/1");

        let err = check_status(500, &ok, "end-lra").unwrap_err();
        assert!(matches!(
            err,
            LraError::UnexpectedStatus { expected: 500, actual: 200, .. }
        ));
    }
}
