use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Random bytes per token; the hex form is twice as long.
pub const TOKEN_BYTES: usize = 16;

/// Header carrying the token on mutating requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// How long an issued token stays usable.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Most tokens held at once; the oldest is dropped beyond this.
pub const MAX_TOKENS: usize = 10_000;

/// A fresh random token, hex encoded.
pub fn issue_token() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Tokens handed out by this process, with their expiry time.
#[derive(Debug)]
pub struct TokenStore {
    issued: RwLock<HashMap<String, Instant>>,
    lifetime: Duration,
    capacity: usize,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::with_limits(TOKEN_LIFETIME, MAX_TOKENS)
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(lifetime: Duration, capacity: usize) -> Self {
        TokenStore {
            issued: RwLock::new(HashMap::new()),
            lifetime,
            capacity: capacity.max(1),
        }
    }

    /// Issue a token and remember it. Expired tokens are dropped first.
    pub fn issue(&self) -> Result<String, getrandom::Error> {
        let token = issue_token()?;
        let now = Instant::now();

        let mut issued = self.issued.write().unwrap_or_else(|e| e.into_inner());
        issued.retain(|_, expires_at| *expires_at > now);
        while issued.len() >= self.capacity {
            let Some(oldest) = issued
                .iter()
                .min_by_key(|(_, expires_at)| **expires_at)
                .map(|(t, _)| t.clone())
            else {
                break;
            };
            issued.remove(&oldest);
        }
        issued.insert(token.clone(), now + self.lifetime);
        Ok(token)
    }

    /// True when `token` was issued by this store and has not expired.
    pub fn is_valid(&self, token: &str) -> bool {
        let issued = self.issued.read().unwrap_or_else(|e| e.into_inner());
        issued
            .get(token)
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }

    /// Number of tokens currently held.
    pub fn len(&self) -> usize {
        self.issued.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
