pub mod extractor;
pub mod follower;
pub mod guard;
mod http;
pub mod webhook;

pub use extractor::ServiceExtractor;
pub use follower::ReqwestRedirectFollower;
pub use guard::ensure_public;
pub use webhook::ReqwestWebhookSender;
