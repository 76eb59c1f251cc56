//! Client-held service filter over the deployment list.
//!
//! The visible list is never spliced in place: it is recomputed from the
//! unfiltered collection, the active key set and the per-key subsets, so the
//! order in which keys were toggled cannot leak into the result.

use std::collections::{BTreeSet, HashMap, HashSet};

use shared::{domain::ServiceName, protocol::ServiceEntry};

use crate::{
    enrich::sort_canonical,
    types::{Deployment, FilterDelta},
};

/// Remote work a filter change needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Unfiltered deployments and the service list.
    Full,
    /// Deployments of each listed service.
    Scoped { keys: Vec<ServiceName> },
    /// Nothing to fetch.
    Cached,
}

impl FetchPlan {
    pub fn fetch_count(&self) -> usize {
        match self {
            Self::Full => 2,
            Self::Scoped { keys } => keys.len(),
            Self::Cached => 0,
        }
    }
}

/// What a completed plan brought back.
#[derive(Debug, Clone)]
pub enum PlanData {
    Full {
        deployments: Vec<Deployment>,
        services: Vec<ServiceEntry>,
    },
    Scoped {
        subsets: Vec<(ServiceName, Vec<Deployment>)>,
    },
    Cached,
}

#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    active: BTreeSet<ServiceName>,
    subsets: HashMap<ServiceName, Vec<Deployment>>,
    full: Option<Vec<Deployment>>,
    services: Vec<ServiceEntry>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active keys in a stable order independent of toggle order.
    pub fn active_keys(&self) -> Vec<ServiceName> {
        self.active.iter().cloned().collect()
    }

    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    pub fn apply(&mut self, delta: &FilterDelta) -> FetchPlan {
        match delta {
            FilterDelta::Reload => self.reload(),
            FilterDelta::Toggle { key, on } => self.toggle(key.clone(), *on),
        }
    }

    pub fn toggle(&mut self, key: ServiceName, on: bool) -> FetchPlan {
        if on {
            self.toggle_on(key)
        } else {
            self.toggle_off(&key)
        }
    }

    /// Plan that refreshes everything the current filter shows.
    pub fn reload(&mut self) -> FetchPlan {
        if self.active.is_empty() {
            FetchPlan::Full
        } else {
            FetchPlan::Scoped {
                keys: self.active_keys(),
            }
        }
    }

    fn toggle_on(&mut self, key: ServiceName) -> FetchPlan {
        self.active.insert(key.clone());
        let mut keys = vec![key.clone()];
        keys.extend(self.uncached_keys().into_iter().filter(|k| *k != key));
        FetchPlan::Scoped { keys }
    }

    fn toggle_off(&mut self, key: &ServiceName) -> FetchPlan {
        let was_active = self.active.remove(key);
        self.subsets.remove(key);

        if self.active.is_empty() {
            // An emptied filter means "everything", never "no items".
            return if was_active || self.full.is_none() {
                FetchPlan::Full
            } else {
                FetchPlan::Cached
            };
        }

        let keys = self.uncached_keys();
        if keys.is_empty() {
            FetchPlan::Cached
        } else {
            FetchPlan::Scoped { keys }
        }
    }

    fn uncached_keys(&self) -> Vec<ServiceName> {
        self.active
            .iter()
            .filter(|key| !self.subsets.contains_key(*key))
            .cloned()
            .collect()
    }

    pub fn absorb(&mut self, data: PlanData) {
        match data {
            PlanData::Full {
                deployments,
                services,
            } => {
                self.full = Some(deployments);
                self.services = services;
            }
            PlanData::Scoped { subsets } => {
                for (key, items) in subsets {
                    if self.active.contains(&key) {
                        self.subsets.insert(key, items);
                    }
                }
            }
            PlanData::Cached => {}
        }
    }

    /// The list to render: the unfiltered collection when no key is active,
    /// otherwise the deduplicated union of the active keys' subsets.
    pub fn visible(&self) -> Vec<Deployment> {
        if self.active.is_empty() {
            return self.full.clone().unwrap_or_default();
        }

        let mut seen = HashSet::new();
        let mut items: Vec<Deployment> = self
            .active
            .iter()
            .filter_map(|key| self.subsets.get(key))
            .flatten()
            .filter(|item| seen.insert(item.key()))
            .cloned()
            .collect();
        sort_canonical(&mut items);
        items
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
