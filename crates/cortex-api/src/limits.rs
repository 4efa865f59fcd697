use async_trait::async_trait;

/// Outcome of the rate-limit collaborator for one request.
#[derive(Debug, Clone, Copy)]
pub enum RateDecision {
    Allowed,
    /// Rejected; the values are passed through as `X-RateLimit-*` headers.
    Limited {
        limit: u32,
        remaining: u32,
        reset_secs: u64,
    },
}

/// Rate limiting is an external collaborator; the core only honors its
/// verdict on turn starts.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, user_id: &str) -> RateDecision;
}

/// Default limiter that never rejects.
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn check(&self, _user_id: &str) -> RateDecision {
        RateDecision::Allowed
    }
}
