//! Per-endpoint silence tracking for the server.

use std::collections::HashMap;

use crate::transport::Endpoint;

/// One row of a [`LivenessRegistry`] snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointStatus {
    /// The remote endpoint.
    pub endpoint: Endpoint,
    /// Ticks since the last datagram from this endpoint.
    pub silent_ticks: u32,
}

/// Known endpoints and the number of ticks since each was last heard from.
///
/// An endpoint is in the counter map iff it is in the ordered endpoint list.
/// Endpoints are kept in the order they were first observed.
#[derive(Clone, Debug)]
pub struct LivenessRegistry {
    order: Vec<Endpoint>,
    counters: HashMap<Endpoint, u32>,
    threshold: u32,
}

impl LivenessRegistry {
    /// Create an empty registry that evicts after `threshold` silent ticks.
    pub fn new(threshold: u32) -> Self {
        Self {
            order: Vec::new(),
            counters: HashMap::new(),
            threshold,
        }
    }

    /// Silent ticks after which an endpoint is evicted.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record a datagram from `endpoint`, resetting its counter.
    ///
    /// Returns `true` if the endpoint was not known before.
    pub fn touch(&mut self, endpoint: Endpoint) -> bool {
        match self.counters.insert(endpoint, 0) {
            Some(_) => false,
            None => {
                self.order.push(endpoint);
                true
            }
        }
    }

    /// Advance every counter by one tick and evict endpoints that reached the
    /// threshold.
    ///
    /// Evicted endpoints are returned in observation order.
    pub fn sweep(&mut self) -> Vec<Endpoint> {
        let threshold = self.threshold;
        let mut evicted = Vec::new();

        for endpoint in &self.order {
            if let Some(counter) = self.counters.get_mut(endpoint) {
                *counter += 1;
                if *counter >= threshold {
                    evicted.push(*endpoint);
                }
            }
        }

        if !evicted.is_empty() {
            for endpoint in &evicted {
                self.counters.remove(endpoint);
            }
            let counters = &self.counters;
            self.order.retain(|endpoint| counters.contains_key(endpoint));
        }

        evicted
    }

    /// Known endpoints in observation order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.order
    }

    /// Ticks since `endpoint` was last heard from, if it is known.
    pub fn silent_ticks(&self, endpoint: &Endpoint) -> Option<u32> {
        self.counters.get(endpoint).copied()
    }

    /// Whether `endpoint` is known.
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.counters.contains_key(endpoint)
    }

    /// Number of known endpoints.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no endpoints are known.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Copy the known endpoints and their counters, in observation order.
    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        self.order
            .iter()
            .map(|endpoint| EndpointStatus {
                endpoint: *endpoint,
                silent_ticks: self.counters.get(endpoint).copied().unwrap_or(0),
            })
            .collect()
    }
}
