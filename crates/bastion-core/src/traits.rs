use std::future::Future;

use url::Url;

use crate::error::AppError;
use crate::models::{ArticleRecord, RequestOptions};
use crate::webhook::WebhookPayload;

/// The external Content Extraction Service.
///
/// Treated as a black box: given a URL and the per-attempt options it either
/// returns an article or fails with a raw error for the classifier.
pub trait Extractor: Send + Sync + Clone {
    fn extract(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<ArticleRecord, AppError>> + Send;
}

/// Terminal response of a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResponse {
    pub final_url: Url,
    pub status: u16,
}

/// Plain HTTP fetch that follows redirects without extracting anything.
///
/// Implementations must stop after [`crate::redirect::MAX_REDIRECTS`] hops.
pub trait RedirectFollower: Send + Sync + Clone {
    fn follow(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<RedirectResponse, AppError>> + Send;
}

/// Posts a payload to a caller-supplied callback URL.
///
/// A non-success response must be reported as an error.
pub trait WebhookSender: Send + Sync + Clone {
    fn send(
        &self,
        target: &Url,
        payload: &WebhookPayload,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
