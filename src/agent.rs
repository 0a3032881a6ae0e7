//! `AgentManager`: owns per-origin connection pools (spec.md §4.3).
//!
//! Each [`AgentKey`] maps to one `ureq::Agent`, which owns its own
//! connection pool. Pool sizing is derived from the concurrency
//! configuration the way spec.md §3 describes: `"auto"` resolves to
//! `clamp(max/2, 1, 64)`; an explicit number passes through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use crate::error::WayfarerError;
use crate::pool::resolve_auto_connections;

/// `"auto"` or an explicit connection count (spec.md §3 `ConcurrencyConfig.agent.connections`).
#[derive(Clone, Copy, Debug)]
pub enum Connections {
    Auto,
    Fixed(usize),
}

impl Default for Connections {
    fn default() -> Self {
        Connections::Auto
    }
}

/// A proxy target (spec.md §6 `proxy`). Only HTTP(S)-forwarding proxies are
/// supported; a SOCKS scheme is rejected at [`AgentManager::agent_for_url`]
/// time with a `WayfarerError::Config` (spec.md §9 open question).
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// Connection-pooling configuration (spec.md §3/§4.3).
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub connections: Connections,
    pub per_domain_pooling: bool,
    pub keep_alive: bool,
    pub keep_alive_timeout: Duration,
    pub pipelining: bool,
    pub bind_address: Option<std::net::IpAddr>,
    pub proxy: Option<ProxyConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            connections: Connections::Auto,
            per_domain_pooling: true,
            keep_alive: true,
            keep_alive_timeout: Duration::from_secs(90),
            pipelining: false,
            bind_address: None,
            proxy: None,
        }
    }
}

/// Key identifying which pool a request's connection is drawn from:
/// the request's origin when per-domain pooling is enabled, else a single
/// shared key (spec.md §3 `AgentKey`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Origin(String),
    Shared,
}

/// A handle to one connection pool, selectable by URL
/// (spec.md §4.3 `getAgentForUrl`).
pub struct AgentHandle {
    pub key: AgentKey,
    pub agent: Arc<ureq::Agent>,
}

/// Owns one `ureq::Agent` per [`AgentKey`], built lazily on first use.
pub struct AgentManager {
    config: AgentConfig,
    max_in_flight: Option<usize>,
    pools: Mutex<HashMap<AgentKey, Arc<ureq::Agent>>>,
}

impl AgentManager {
    pub fn new(config: AgentConfig, max_in_flight: Option<usize>) -> Self {
        AgentManager {
            config,
            max_in_flight,
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn key_for(&self, url: &Url) -> AgentKey {
        if self.config.per_domain_pooling {
            AgentKey::Origin(crate::url::origin(url))
        } else {
            AgentKey::Shared
        }
    }

    fn connection_count(&self) -> usize {
        match self.config.connections {
            Connections::Fixed(n) => n,
            Connections::Auto => resolve_auto_connections(self.max_in_flight),
        }
    }

    fn build_agent(&self) -> Result<ureq::Agent, WayfarerError> {
        let pool_size = self.connection_count();
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            // Redirects are handled manually by the transport (spec.md §4.2.2)
            // so the underlying engine must never auto-follow them.
            .max_redirects(0)
            .max_idle_connections(pool_size)
            .max_idle_connections_per_host(pool_size);

        if !self.config.keep_alive {
            builder = builder.max_idle_connections(0);
        }

        if let Some(addr) = self.config.bind_address {
            builder = builder.local_address(Some(addr.into()));
        }

        if let Some(proxy) = &self.config.proxy {
            if proxy.url.scheme().starts_with("socks") {
                return Err(WayfarerError::Config(format!(
                    "SOCKS proxies are not supported: {}",
                    proxy.url
                )));
            }
            let proxy = ureq::Proxy::new(proxy.url.as_str())
                .map_err(|e| WayfarerError::Config(e.to_string()))?;
            builder = builder.proxy(Some(proxy));
        }

        Ok(builder.build().into())
    }

    /// Returns the pool for `url`'s key, creating it if this is the first
    /// request to that key.
    pub fn agent_for_url(&self, url: &Url) -> Result<AgentHandle, WayfarerError> {
        let key = self.key_for(url);
        let mut pools = self.pools.lock().unwrap();
        if let Some(agent) = pools.get(&key) {
            return Ok(AgentHandle {
                key,
                agent: Arc::clone(agent),
            });
        }
        let agent = Arc::new(self.build_agent()?);
        pools.insert(key.clone(), Arc::clone(&agent));
        Ok(AgentHandle { key, agent })
    }

    pub fn pool_count(&self) -> usize {
        self.pools.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_domain_pooling_keys_by_origin() {
        let mgr = AgentManager::new(AgentConfig::default(), Some(8));
        let a = mgr
            .agent_for_url(&Url::parse("https://a.example.com/x").unwrap())
            .unwrap();
        let b = mgr
            .agent_for_url(&Url::parse("https://b.example.com/x").unwrap())
            .unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(mgr.pool_count(), 2);
    }

    #[test]
    fn shared_pooling_reuses_a_single_key() {
        let mut cfg = AgentConfig::default();
        cfg.per_domain_pooling = false;
        let mgr = AgentManager::new(cfg, Some(8));
        mgr.agent_for_url(&Url::parse("https://a.example.com/x").unwrap())
            .unwrap();
        mgr.agent_for_url(&Url::parse("https://b.example.com/x").unwrap())
            .unwrap();
        assert_eq!(mgr.pool_count(), 1);
    }

    #[test]
    fn revisiting_the_same_origin_reuses_the_pool() {
        let mgr = AgentManager::new(AgentConfig::default(), Some(8));
        let url = Url::parse("https://a.example.com/x").unwrap();
        mgr.agent_for_url(&url).unwrap();
        mgr.agent_for_url(&url).unwrap();
        assert_eq!(mgr.pool_count(), 1);
    }
}
