use crate::backoff::{BackoffDecision, BackoffPolicy};
use crate::blocklist::DomainBlocklist;
use crate::classify::classify;
use crate::error::AppError;
use crate::identity::{IdentityPool, IdentitySource, merge_headers};
use crate::models::{AttemptOutcome, AttemptResult, FetchRequest, RequestOptions, RequestOutcome};
use crate::report::{FetchEvent, FetchReporter};
use crate::traits::Extractor;

/// Outcome of a retry sequence together with its attempt history,
/// oldest attempt first.
#[derive(Debug, Clone)]
pub struct RetryTrace {
    pub outcome: RequestOutcome,
    pub attempts: Vec<AttemptResult>,
}

/// Drives one URL through identity rotation, the extraction call, error
/// classification and the backoff policy until it succeeds or the attempt
/// budget is spent.
///
/// Generic over the extraction service and the identity source so it can be
/// exercised without real HTTP.
#[derive(Clone)]
pub struct RetryOrchestrator<E, I = IdentityPool>
where
    E: Extractor,
    I: IdentitySource,
{
    extractor: E,
    identity: I,
    policy: BackoffPolicy,
    blocklist: DomainBlocklist,
}

impl<E: Extractor> RetryOrchestrator<E, IdentityPool> {
    /// Create an orchestrator with the default identity pool and backoff table.
    pub fn new(extractor: E) -> Self {
        Self::with_identity(extractor, IdentityPool::default())
    }
}

impl<E, I> RetryOrchestrator<E, I>
where
    E: Extractor,
    I: IdentitySource,
{
    pub fn with_identity(extractor: E, identity: I) -> Self {
        Self {
            extractor,
            identity,
            policy: BackoffPolicy::default(),
            blocklist: DomainBlocklist::default(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// URLs on these domains fail immediately with zero attempts.
    pub fn with_blocklist(mut self, blocklist: DomainBlocklist) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn blocklist(&self) -> &DomainBlocklist {
        &self.blocklist
    }

    /// Run the request to a terminal outcome.
    ///
    /// Never fails: exhaustion is reported as an unsuccessful outcome.
    pub async fn execute<R: FetchReporter>(
        &self,
        request: FetchRequest,
        reporter: &R,
    ) -> RequestOutcome {
        self.execute_traced(request, reporter).await.outcome
    }

    /// Same as [`execute`](Self::execute), also returning every attempt.
    ///
    /// A blocklisted domain short-circuits before step 1 with no attempts.
    ///
    /// 1. Fresh identity headers, merged with the request overrides
    /// 2. Extraction call bounded by the request timeout
    /// 3. On failure: classify, consult the backoff table, maybe downgrade
    ///    TLS, sleep, repeat
    pub async fn execute_traced<R: FetchReporter>(
        &self,
        mut request: FetchRequest,
        reporter: &R,
    ) -> RetryTrace {
        if let Some(domain) = self.blocklist.matching(request.url()) {
            reporter.report(FetchEvent::Blocked {
                url: request.url(),
                domain,
            });
            return RetryTrace {
                outcome: RequestOutcome::failed(
                    request.url().as_str(),
                    format!("Domain {domain} is blocklisted; extraction skipped"),
                    0,
                ),
                attempts: Vec::new(),
            };
        }

        let mut attempts = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let insecure_tls = request.allow_insecure_tls();
            reporter.report(FetchEvent::AttemptStarted {
                url: request.url(),
                attempt,
                max_retries: request.max_retries(),
                insecure_tls,
            });

            let headers = merge_headers(
                self.identity.next_headers(request.url()),
                request.override_headers(),
            );
            let options = RequestOptions {
                headers,
                timeout: request.timeout(),
                allow_insecure_tls: insecure_tls,
            };

            let result = match tokio::time::timeout(
                request.timeout(),
                self.extractor.extract(request.url(), &options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(request.timeout().as_secs())),
            };

            let (error, rejected) = match result {
                Ok(article) => {
                    attempts.push(AttemptResult {
                        attempt_number: attempt,
                        insecure_tls,
                        outcome: AttemptOutcome::Success(article.clone()),
                    });
                    reporter.report(FetchEvent::Succeeded {
                        url: request.url(),
                        attempts: attempt,
                    });
                    return RetryTrace {
                        outcome: RequestOutcome::succeeded(request.url().as_str(), article, attempt),
                        attempts,
                    };
                }
                Err(e) => (classify(&e), e.is_input_error()),
            };

            reporter.report(FetchEvent::AttemptFailed {
                url: request.url(),
                attempt,
                error: &error,
            });
            // A rejected input fails the same way on every attempt.
            let decision = if rejected {
                BackoffDecision::Stop
            } else {
                self.policy.decide(error.kind, attempt, request.max_retries())
            };

            let message = error.message.clone();
            attempts.push(AttemptResult {
                attempt_number: attempt,
                insecure_tls,
                outcome: AttemptOutcome::Failure(error),
            });

            let delay = match decision {
                BackoffDecision::Stop => {
                    reporter.report(FetchEvent::GaveUp {
                        url: request.url(),
                        attempts: attempt,
                        error: &message,
                    });
                    return RetryTrace {
                        outcome: RequestOutcome::failed(request.url().as_str(), message, attempt),
                        attempts,
                    };
                }
                BackoffDecision::RetryAfter(delay) => delay,
                BackoffDecision::RetryWithTlsDowngrade(delay) => {
                    if request.downgrade_tls() {
                        reporter.report(FetchEvent::TlsDowngraded {
                            url: request.url(),
                            attempt,
                        });
                    }
                    delay
                }
            };

            reporter.report(FetchEvent::BackoffScheduled {
                url: request.url(),
                attempt,
                delay,
            });
            tokio::time::sleep(delay).await;
        }
    }
}
