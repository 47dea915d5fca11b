use catalog_config::FetchConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Who is asking for a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    /// A signed-in user, by id.
    User(String),
    Anonymous,
}

/// Time-boxed throttle deciding which request may trigger a fetch.
///
/// Two windows apply: one per caller (all anonymous callers share a single
/// window) and one per URL. The first caller in a window wins; everyone else
/// is told to wait. A caller that wins its own window still uses it up when
/// the URL window turns it down.
#[derive(Debug)]
pub struct FetchLock {
    authenticated: Duration,
    anonymous: Duration,
    url: Duration,
    expiries: Mutex<HashMap<String, Instant>>,
}
impl FetchLock {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            authenticated: config.authenticated_throttle(),
            anonymous: config.anonymous_throttle(),
            url: config.url_throttle(),
            expiries: Mutex::new(HashMap::new()),
        }
    }

    /// Try to take the fetch lock for `url` on behalf of `caller`.
    pub fn try_acquire(&self, caller: &Caller, url: &str) -> bool {
        let now = Instant::now();
        let mut expiries = self.expiries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        expiries.retain(|_, expires| *expires > now);

        let (caller_key, caller_ttl) = match caller {
            Caller::User(id) => (format!("user:{id}"), self.authenticated),
            Caller::Anonymous => ("anonymous".to_string(), self.anonymous),
        };
        if expiries.contains_key(&caller_key) {
            tracing::debug!(?caller, "Caller is throttled");
            return false;
        }
        expiries.insert(caller_key, now + caller_ttl);

        let url_key = format!("url:{url}");
        if expiries.contains_key(&url_key) {
            tracing::debug!(url, "URL was fetched recently");
            return false;
        }
        expiries.insert(url_key, now + self.url);
        true
    }
}
