//! Ordered failover across source adapters.
//!
//! Nodes live in a flat arena and point at their successor by index. The chain
//! is built once and never mutated, so concurrent queries share it freely.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{ProviderId, WeatherError, WeatherObservation, WeatherProvider};

#[derive(Debug)]
struct ChainNode {
    provider_id: ProviderId,
    provider: Arc<dyn WeatherProvider>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct FailoverChain {
    nodes: Vec<ChainNode>,
    head: usize,
}

impl FailoverChain {
    /// Link `providers` in the given order.
    ///
    /// Fails with [`WeatherError::NoProvidersConfigured`] when `providers` is empty.
    pub fn new(
        providers: Vec<(ProviderId, Arc<dyn WeatherProvider>)>,
    ) -> Result<Self, WeatherError> {
        if providers.is_empty() {
            return Err(WeatherError::NoProvidersConfigured);
        }

        let len = providers.len();
        let nodes = providers
            .into_iter()
            .enumerate()
            .map(|(idx, (provider_id, provider))| ChainNode {
                provider_id,
                provider,
                next: (idx + 1 < len).then_some(idx + 1),
            })
            .collect();

        Ok(Self { nodes, head: 0 })
    }

    /// Provider identities in the order they are tried.
    pub fn order(&self) -> Vec<ProviderId> {
        self.walk().map(|node| node.provider_id).collect()
    }

    fn walk(&self) -> impl Iterator<Item = &ChainNode> {
        let mut cursor = Some(self.head);
        std::iter::from_fn(move || {
            let node = self.nodes.get(cursor?)?;
            cursor = node.next;
            Some(node)
        })
    }
}

#[async_trait]
impl WeatherProvider for FailoverChain {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        for node in self.walk() {
            match node.provider.get_weather(place).await {
                Ok(observation) => {
                    debug!(provider = %node.provider_id, place, "provider answered");
                    return Ok(observation);
                }
                Err(err) => {
                    warn!(
                        provider = %node.provider_id,
                        place,
                        kind = %err.kind(),
                        error = %err,
                        "provider failed, falling over to next"
                    );
                }
            }
        }

        Err(WeatherError::AllProvidersFailed { place: place.to_string() })
    }

    fn describe(&self) -> String {
        let links: Vec<String> = self.walk().map(|node| node.provider.describe()).collect();
        format!("chain[{}]", links.join(" -> "))
    }
}
