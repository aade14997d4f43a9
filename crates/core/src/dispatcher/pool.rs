//! Per agent type concurrency limits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::types::{DispatcherError, PoolStatus};

/// Statistics for a single pool.
#[derive(Debug, Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct Slot {
    limit: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

/// A held pool slot. Dropping it returns the slot to its pool.
#[derive(Debug)]
pub struct AgentPermit {
    agent_type: String,
    stats: Arc<PoolStats>,
    _permit: OwnedSemaphorePermit,
}

impl AgentPermit {
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }
}

impl Drop for AgentPermit {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pool limits for the built-in agent types.
pub fn default_pool_limits() -> BTreeMap<String, usize> {
    [
        ("content", 2),
        ("development", 3),
        ("asset", 2),
        ("qa", 4),
        ("infrastructure", 2),
    ]
    .into_iter()
    .map(|(agent_type, limit)| (agent_type.to_string(), limit))
    .collect()
}

/// Fixed mapping from agent type to a counting semaphore of its limit.
/// Pools are independent of each other.
#[derive(Debug)]
pub struct AgentPool {
    slots: BTreeMap<String, Slot>,
}

impl AgentPool {
    /// Build pools from `(agent_type, limit)` pairs. Every limit must be positive.
    pub fn new<I, S>(limits: I) -> Result<Self, DispatcherError>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut slots = BTreeMap::new();
        for (agent_type, limit) in limits {
            let agent_type = agent_type.into();
            if limit == 0 {
                return Err(DispatcherError::Configuration(format!(
                    "pool limit for agent type '{}' must be positive",
                    agent_type
                )));
            }
            slots.insert(
                agent_type,
                Slot {
                    limit,
                    semaphore: Arc::new(Semaphore::new(limit)),
                    stats: Arc::new(PoolStats::default()),
                },
            );
        }
        Ok(Self { slots })
    }

    pub fn from_config(pools: &BTreeMap<String, usize>) -> Result<Self, DispatcherError> {
        Self::new(pools.iter().map(|(name, limit)| (name.clone(), *limit)))
    }

    fn slot(&self, agent_type: &str) -> Result<&Slot, DispatcherError> {
        self.slots.get(agent_type).ok_or_else(|| {
            DispatcherError::Configuration(format!(
                "no agent pool configured for agent type '{}'",
                agent_type
            ))
        })
    }

    pub fn contains(&self, agent_type: &str) -> bool {
        self.slots.contains_key(agent_type)
    }

    pub fn agent_types(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn limit(&self, agent_type: &str) -> Option<usize> {
        self.slots.get(agent_type).map(|slot| slot.limit)
    }

    /// Free permits for the agent type; `None` if it has no pool.
    pub fn available(&self, agent_type: &str) -> Option<usize> {
        self.slots
            .get(agent_type)
            .map(|slot| slot.semaphore.available_permits())
    }

    /// Wait for a free permit of the agent type.
    pub async fn acquire(&self, agent_type: &str) -> Result<AgentPermit, DispatcherError> {
        let slot = self.slot(agent_type)?;

        slot.stats.queued.fetch_add(1, Ordering::Relaxed);
        let permit = Arc::clone(&slot.semaphore).acquire_owned().await;
        slot.stats.queued.fetch_sub(1, Ordering::Relaxed);

        let permit = permit.map_err(|_| DispatcherError::NotRunning)?;
        Ok(Self::wrap(agent_type, slot, permit))
    }

    /// Take a permit if one is free right now.
    pub fn try_acquire(&self, agent_type: &str) -> Result<Option<AgentPermit>, DispatcherError> {
        let slot = self.slot(agent_type)?;
        match Arc::clone(&slot.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(Self::wrap(agent_type, slot, permit))),
            Err(_) => Ok(None),
        }
    }

    fn wrap(agent_type: &str, slot: &Slot, permit: OwnedSemaphorePermit) -> AgentPermit {
        slot.stats.active.fetch_add(1, Ordering::Relaxed);
        AgentPermit {
            agent_type: agent_type.to_string(),
            stats: Arc::clone(&slot.stats),
            _permit: permit,
        }
    }

    /// Return a permit to its pool.
    pub fn release(&self, permit: AgentPermit) {
        drop(permit);
    }

    /// Count a finished task against its pool.
    pub fn record_outcome(&self, agent_type: &str, succeeded: bool) {
        if let Some(slot) = self.slots.get(agent_type) {
            slot.stats.total_processed.fetch_add(1, Ordering::Relaxed);
            if !succeeded {
                slot.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Status of every pool, sorted by agent type.
    pub fn status(&self) -> Vec<PoolStatus> {
        self.slots
            .iter()
            .map(|(name, slot)| slot.stats.to_status(name, slot.limit))
            .collect()
    }
}
