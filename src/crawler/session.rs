//! Session identity contract
//!
//! A session is the identity a run presents to the target site: cookies,
//! fingerprint and, when configured, the proxy exit. The crawler never looks
//! inside it. It only reports how the last request went.

/// Feedback channel for the identity used by a run
pub trait Session: Send + Sync {
    /// The current identity was served a block page; replace it
    fn retire(&self, reason: &str);

    /// The current identity produced a usable page
    fn mark_good(&self);
}

/// Session for transports without an identity to rotate
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSession;

impl Session for NoopSession {
    fn retire(&self, reason: &str) {
        tracing::debug!("Session retire requested ({}), nothing to rotate", reason);
    }

    fn mark_good(&self) {}
}
