use http::Extensions;
use std::time::Duration;
use tokio::time::Instant;

/// Per-request unit of work threaded through every driver call.
///
/// The engine never opens or commits anything on it; callers put whatever
/// their drivers need (connections, transactions, tenant ids) into the
/// extension map.
#[derive(Debug, Default)]
pub struct Session {
    user_id: Option<String>,
    deadline: Option<Instant>,
    extensions: Extensions,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    struct Tenant(String);

    #[test]
    fn test_extensions_round_trip() {
        let session = Session::new()
            .with_user("u-1")
            .with_extension(Tenant("acme".to_string()))
            .with_extension(Arc::new(5u32));

        assert_eq!(session.user_id(), Some("u-1"));
        assert_eq!(session.get::<Tenant>(), Some(&Tenant("acme".to_string())));
        assert_eq!(session.get::<Arc<u32>>().map(|v| **v), Some(5));
        assert!(session.get::<String>().is_none());
    }
}
