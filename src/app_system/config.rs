use std::str::FromStr;
use std::time::Duration;

use crate::feed::{OutOfScopePolicy, DEFAULT_PAGE_SIZE};

use super::SystemError;

/// Runtime knobs for the feed, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub poll_interval: Duration,
    pub page_size: u32,
    pub buffer_size: usize,
    pub out_of_scope: OutOfScopePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3000),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_size: 100,
            out_of_scope: OutOfScopePolicy::Ignore,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, SystemError> {
        let defaults = Self::default();
        let config = Self {
            poll_interval: env_or("FEED_POLL_INTERVAL_MS", defaults.poll_interval.as_millis() as u64)
                .map(Duration::from_millis)?,
            page_size: env_or("FEED_PAGE_SIZE", defaults.page_size)?,
            buffer_size: env_or("FEED_BUFFER_SIZE", defaults.buffer_size)?,
            out_of_scope: env_or("FEED_OUT_OF_SCOPE_POLICY", defaults.out_of_scope)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot work with. Page size is checked by
    /// [`PageRequest::new`](crate::feed::PageRequest::new).
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.poll_interval.is_zero() {
            return Err(SystemError::Config("poll interval must be positive".into()));
        }
        if self.buffer_size == 0 {
            return Err(SystemError::Config("buffer size must be positive".into()));
        }
        Ok(())
    }
}

/// Reads and parses `key`, falling back to `default` only when it is unset.
fn env_or<T>(key: &str, default: T) -> Result<T, SystemError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SystemError::Config(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserType {
    #[default]
    Admin,
    Vendor,
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserType::Admin),
            "VENDOR" => Ok(UserType::Vendor),
            other => Err(format!("unknown user type: {}", other)),
        }
    }
}

/// Who is looking at the feed. A restaurant id scopes both the pulls and
/// the push subscription; without one the session sees all orders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub restaurant_id: Option<String>,
    pub user_type: UserType,
}

impl Session {
    pub fn restaurant(restaurant_id: impl Into<String>, user_type: UserType) -> Self {
        Self {
            restaurant_id: Some(restaurant_id.into()),
            user_type,
        }
    }

    pub fn from_env() -> Result<Self, SystemError> {
        Ok(Self {
            restaurant_id: std::env::var("RESTAURANT_ID").ok().filter(|s| !s.is_empty()),
            user_type: env_or("USER_TYPE", UserType::default())?,
        })
    }

    /// Vendors only ever see their own restaurant.
    pub fn validate(&self) -> Result<(), SystemError> {
        if self.user_type == UserType::Vendor && self.restaurant_id.is_none() {
            return Err(SystemError::Config("a vendor session needs a restaurant id".into()));
        }
        Ok(())
    }
}
