//! The transactional shell around the pool engine.
//!
//! `ConfigurableCorePool` forwards operations to [`CorePool`], records a
//! [`Transition`] per successful mutation, and keeps a pre-image journal so
//! any recorded transition can be undone byte for byte. Fork and recover
//! start a fresh transition log; stepping back across those roots is
//! disallowed.

use std::sync::Arc;

use alloy::primitives::{I256, U256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{MachineError, PoolError};
use crate::machine::roadmap::{PoolRecord, Roadmap};
use crate::machine::transition::{Transition, TransitionEvent};
use crate::protocol::pool::{CorePool, PoolConfig, PoolState, Snapshot};

/// Observer invoked after every successful transition with the post-state
/// engine and the transition record. An error undoes the transition.
///
/// The observer never holds the pool; it only sees it per call, which keeps
/// the pool/processor relationship acyclic.
pub trait TransitionObserver: Send {
    fn on_transition(
        &mut self,
        pool: &CorePool,
        transition: &Transition,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> TransitionObserver for F
where
    F: FnMut(&CorePool, &Transition) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send,
{
    fn on_transition(
        &mut self,
        pool: &CorePool,
        transition: &Transition,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self(pool, transition)
    }
}

pub struct ConfigurableCorePool {
    pool_id: Uuid,
    pool: CorePool,
    roadmap: Arc<Roadmap>,
    transitions: Vec<Transition>,
    /// Pre-images, parallel to `transitions`. Roots (fork/recover) carry
    /// `None` and cannot be stepped back.
    journal: Vec<Option<PoolState>>,
    post_processor: Option<Box<dyn TransitionObserver>>,
}

impl ConfigurableCorePool {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_roadmap(config, Roadmap::shared())
    }

    pub fn with_roadmap(config: PoolConfig, roadmap: Arc<Roadmap>) -> Self {
        let pool = CorePool::new(config);
        let pool_id = Uuid::new_v4();
        roadmap.register_pool(PoolRecord {
            pool_id,
            config: pool.config().clone(),
            forked_from: None,
            registered_at: chrono::Utc::now(),
        });
        info!(%pool_id, "pool created");
        Self { pool_id, pool, roadmap, transitions: Vec::new(), journal: Vec::new(), post_processor: None }
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    pub fn pool(&self) -> &CorePool {
        &self.pool
    }

    pub fn state(&self) -> &PoolState {
        self.pool.state()
    }

    pub fn config(&self) -> &PoolConfig {
        self.pool.config()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn roadmap(&self) -> &Arc<Roadmap> {
        &self.roadmap
    }

    /// Installs the post-processor invoked after each transition.
    pub fn update_post_processor(&mut self, observer: Box<dyn TransitionObserver>) {
        self.post_processor = Some(observer);
    }

    pub fn clear_post_processor(&mut self) {
        self.post_processor = None;
    }

    fn last_transition_id(&self) -> Option<Uuid> {
        self.transitions.last().map(|t| t.id)
    }

    /// Runs one engine operation transactionally: on success a transition is
    /// recorded and the post-processor consulted; on any failure the pool is
    /// left exactly as it was. Engine no-ops (the state id did not move)
    /// record nothing.
    fn record<T>(
        &mut self,
        op: impl FnOnce(&mut CorePool) -> Result<(T, TransitionEvent), PoolError>,
    ) -> Result<T, MachineError> {
        let pre_image = self.pool.state().clone();
        let (value, event) = op(&mut self.pool)?;

        if self.pool.state().id == pre_image.id {
            return Ok(value);
        }

        let transition =
            Transition::new(self.last_transition_id(), event, self.pool.state().id);
        if let Some(observer) = self.post_processor.as_mut() {
            if let Err(err) = observer.on_transition(&self.pool, &transition) {
                self.pool.replace_state(pre_image);
                return Err(MachineError::PostProcessor(err.to_string()));
            }
        }
        debug!(pool_id = %self.pool_id, kind = transition.event.kind(), transition_id = %transition.id, "transition recorded");
        self.transitions.push(transition);
        self.journal.push(Some(pre_image));
        Ok(value)
    }

    pub fn initialize(&mut self, sqrt_price_x96: U256) -> Result<(), MachineError> {
        self.record(|pool| {
            pool.initialize(sqrt_price_x96)?;
            Ok(((), TransitionEvent::Initialize { sqrt_price_x96 }))
        })
    }

    pub fn mint(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), MachineError> {
        let owner = owner.to_string();
        self.record(move |pool| {
            let (amount0, amount1) = pool.mint(&owner, tick_lower, tick_upper, amount)?;
            Ok((
                (amount0, amount1),
                TransitionEvent::Mint { owner, tick_lower, tick_upper, amount, amount0, amount1 },
            ))
        })
    }

    pub fn burn(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount: u128,
    ) -> Result<(U256, U256), MachineError> {
        let owner = owner.to_string();
        self.record(move |pool| {
            let (amount0, amount1) = pool.burn(&owner, tick_lower, tick_upper, amount)?;
            Ok((
                (amount0, amount1),
                TransitionEvent::Burn { owner, tick_lower, tick_upper, amount, amount0, amount1 },
            ))
        })
    }

    pub fn swap(
        &mut self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), MachineError> {
        self.record(move |pool| {
            let (amount0, amount1) =
                pool.swap(zero_for_one, amount_specified, sqrt_price_limit_x96)?;
            Ok((
                (amount0, amount1),
                TransitionEvent::Swap {
                    zero_for_one,
                    amount_specified,
                    sqrt_price_limit_x96,
                    amount0,
                    amount1,
                },
            ))
        })
    }

    pub fn collect(
        &mut self,
        owner: &str,
        tick_lower: i32,
        tick_upper: i32,
        amount0_requested: u128,
        amount1_requested: u128,
    ) -> Result<(u128, u128), MachineError> {
        let owner = owner.to_string();
        self.record(move |pool| {
            let (amount0, amount1) =
                pool.collect(&owner, tick_lower, tick_upper, amount0_requested, amount1_requested)?;
            Ok((
                (amount0, amount1),
                TransitionEvent::Collect {
                    owner,
                    tick_lower,
                    tick_upper,
                    amount0_requested,
                    amount1_requested,
                    amount0,
                    amount1,
                },
            ))
        })
    }

    /// Computes the result of a swap against a deep clone; the live pool is
    /// untouched and no transition is recorded.
    pub fn query_swap(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
        sqrt_price_limit_x96: Option<U256>,
    ) -> Result<(I256, I256), MachineError> {
        let mut scratch = self.pool.clone();
        Ok(scratch.swap(zero_for_one, amount_specified, sqrt_price_limit_x96)?)
    }

    /// Deep-copies the current state into a new pool rooted at a `FORK`
    /// transition. The fork shares no mutable storage with this pool.
    pub fn fork(&self) -> ConfigurableCorePool {
        let mut state = self.pool.state().clone();
        state.id = Uuid::new_v4();
        let pool = CorePool::from_parts(self.pool.config().clone(), state);
        let pool_id = Uuid::new_v4();
        self.roadmap.register_pool(PoolRecord {
            pool_id,
            config: pool.config().clone(),
            forked_from: Some(self.pool_id),
            registered_at: chrono::Utc::now(),
        });
        let root = Transition::new(
            None,
            TransitionEvent::Fork { source_pool_id: self.pool_id },
            pool.state().id,
        );
        info!(source = %self.pool_id, fork = %pool_id, "pool forked");
        ConfigurableCorePool {
            pool_id,
            pool,
            roadmap: self.roadmap.clone(),
            transitions: vec![root],
            journal: vec![None],
            post_processor: None,
        }
    }

    /// Deep-copies the current state into `state.snapshot` under a fresh
    /// snapshot id and registers it with the roadmap. Persistence is not
    /// touched.
    pub fn take_snapshot(&mut self, description: &str) -> Result<Uuid, MachineError> {
        let snapshot = Snapshot::capture(description, self.pool.config(), self.pool.state());
        let snapshot_id = snapshot.id;
        let stored = snapshot.clone();
        self.record(move |pool| {
            let state = pool.state_mut();
            state.snapshot = Some(stored);
            state.id = Uuid::new_v4();
            Ok((snapshot_id, TransitionEvent::Snapshot { snapshot_id }))
        })?;
        self.roadmap.register_snapshot(snapshot);
        Ok(snapshot_id)
    }

    /// Undoes the most recent transition, restoring the pre-transition state
    /// byte for byte. Fails at the log's root.
    pub fn step_back(&mut self) -> Result<(), MachineError> {
        match self.journal.pop() {
            Some(Some(pre_image)) => {
                self.transitions.pop();
                self.pool.replace_state(pre_image);
                Ok(())
            }
            Some(None) => {
                // fork/recover root: not undoable, keep the marker
                self.journal.push(None);
                Err(MachineError::NoTransition)
            }
            None => Err(MachineError::NoTransition),
        }
    }

    /// Replaces the state with a deep copy of the identified snapshot
    /// (memory first, then the persistent store) and resets the transition
    /// log to a single `RECOVER` root.
    pub async fn recover(&mut self, snapshot_id: Uuid) -> Result<(), MachineError> {
        let snapshot = self.roadmap.load_snapshot(snapshot_id).await?;
        let pool = CorePool::from_parts(snapshot.config.clone(), snapshot.restore());
        let root =
            Transition::new(None, TransitionEvent::Recover { snapshot_id }, pool.state().id);

        if let Some(observer) = self.post_processor.as_mut() {
            if let Err(err) = observer.on_transition(&pool, &root) {
                return Err(MachineError::PostProcessor(err.to_string()));
            }
        }

        info!(pool_id = %self.pool_id, %snapshot_id, "recovered from snapshot");
        self.pool = pool;
        self.transitions = vec![root];
        self.journal = vec![None];
        Ok(())
    }

    /// Writes the current snapshot (taking one first if absent) to the
    /// persistent store and returns its id.
    pub async fn persist_snapshot(&mut self) -> Result<Uuid, MachineError> {
        let snapshot = match self.pool.state().snapshot.clone() {
            Some(snapshot) => snapshot,
            None => {
                let snapshot_id = self.take_snapshot("persisted")?;
                self.roadmap.load_snapshot(snapshot_id).await?
            }
        };
        self.roadmap.persist(&snapshot).await?;
        info!(pool_id = %self.pool_id, snapshot_id = %snapshot.id, "snapshot persisted");
        Ok(snapshot.id)
    }
}
