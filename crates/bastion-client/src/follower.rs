use std::future::Future;
use std::time::Duration;

use bastion_core::error::AppError;
use bastion_core::models::RequestOptions;
use bastion_core::redirect::MAX_REDIRECTS;
use bastion_core::traits::{RedirectFollower, RedirectResponse};
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use url::Url;

use crate::guard::ensure_public;
use crate::http::{ClientPair, header_map, map_send_error};

/// Follows a redirect chain with a plain GET and reports where it ended.
///
/// Redirects are walked hop by hop so the outbound address check runs on
/// every URL in the chain, not only the first. The check is on by default;
/// use [`allow_private_urls`](Self::allow_private_urls) for local tooling
/// where the user controls the machine.
#[derive(Clone)]
pub struct ReqwestRedirectFollower {
    clients: ClientPair,
    ssrf_protection: bool,
}

impl ReqwestRedirectFollower {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            clients: ClientPair::build(timeout)?,
            ssrf_protection: true,
        })
    }

    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }
}

impl RedirectFollower for ReqwestRedirectFollower {
    async fn follow(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<RedirectResponse, AppError> {
        let ssrf_protection = self.ssrf_protection;
        let client = self.clients.get(options.allow_insecure_tls);

        follow_redirects(client, url, options, move |hop| async move {
            if ssrf_protection {
                ensure_public(&hop).await
            } else {
                Ok(())
            }
        })
        .await
    }
}

/// GET `start` and follow up to [`MAX_REDIRECTS`] `Location` hops, calling
/// `check` on each URL before it is requested.
async fn follow_redirects<C, Fut>(
    client: &Client,
    start: &Url,
    options: &RequestOptions,
    check: C,
) -> Result<RedirectResponse, AppError>
where
    C: Fn(Url) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let headers = header_map(&options.headers);
    let mut current = start.clone();

    for _ in 0..=MAX_REDIRECTS {
        check(current.clone()).await?;

        let response = client
            .get(current.clone())
            .headers(headers.clone())
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, options.timeout))?;

        let status = response.status();
        let next = if status.is_redirection() {
            next_location(&current, &response)
        } else {
            None
        };

        match next {
            Some(next) => {
                tracing::debug!(
                    from = %current,
                    to = %next,
                    status = status.as_u16(),
                    "Following redirect"
                );
                current = next;
            }
            None => {
                return Ok(RedirectResponse {
                    final_url: current,
                    status: status.as_u16(),
                });
            }
        }
    }

    Err(AppError::HttpError(format!(
        "Too many redirects (more than {MAX_REDIRECTS}) starting at {start}"
    )))
}

/// Absolute http(s) target of a redirect response, if it names one.
fn next_location(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let next = current.join(location).ok()?;
    matches!(next.scheme(), "http" | "https").then_some(next)
}
