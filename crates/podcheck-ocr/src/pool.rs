// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Checkout pool of consensus engines for batch workers.
//
// Engines are created lazily up to `max_size`. When every engine is checked
// out, `acquire` blocks until one is returned. The RAII guard puts the engine
// back on drop.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};
use podcheck_core::error::{PodError, Result};
use tracing::debug;

use crate::consensus::ConsensusEngine;

type Factory = Box<dyn Fn() -> Result<ConsensusEngine> + Send + Sync>;

/// Pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub active: usize,
    pub available: usize,
    pub max_size: usize,
}

struct Slots {
    idle: Vec<ConsensusEngine>,
    created: usize,
}

pub struct EnginePool {
    slots: Mutex<Slots>,
    returned: Condvar,
    factory: Factory,
    max_size: usize,
    active_count: AtomicUsize,
}

impl EnginePool {
    /// Pool creating engines with `factory`, at most `max_size` (minimum 1).
    pub fn new(max_size: usize, factory: impl Fn() -> Result<ConsensusEngine> + Send + Sync + 'static) -> Self {
        Self {
            slots: Mutex::new(Slots {
                idle: Vec::with_capacity(max_size.max(1)),
                created: 0,
            }),
            returned: Condvar::new(),
            factory: Box::new(factory),
            max_size: max_size.max(1),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Pool of `max_size` clones of one engine. Backends are shared, not copied.
    pub fn shared(max_size: usize, engine: ConsensusEngine) -> Self {
        Self::new(max_size, move || Ok(engine.clone()))
    }

    /// Check out an engine, creating one if under the limit, else waiting.
    pub fn acquire(&self) -> Result<PooledEngine<'_>> {
        let mut slots = self.slots.lock();
        loop {
            if let Some(engine) = slots.idle.pop() {
                return Ok(self.guard(engine));
            }
            if slots.created < self.max_size {
                slots.created += 1;
                // Build outside the lock so slow model loading does not block returns.
                drop(slots);
                let built = (self.factory)();
                return match built {
                    Ok(engine) => {
                        debug!(max_size = self.max_size, "Created pooled OCR engine");
                        Ok(self.guard(engine))
                    }
                    Err(err) => {
                        self.slots.lock().created -= 1;
                        self.returned.notify_one();
                        Err(PodError::Pool(format!("failed to create OCR engine: {err}")))
                    }
                };
            }
            self.returned.wait(&mut slots);
        }
    }

    /// Check out an engine without waiting or creating.
    pub fn try_acquire(&self) -> Option<PooledEngine<'_>> {
        let engine = self.slots.lock().idle.pop()?;
        Some(self.guard(engine))
    }

    fn guard(&self, engine: ConsensusEngine) -> PooledEngine<'_> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        PooledEngine {
            engine: Some(engine),
            pool: self,
        }
    }

    fn release(&self, engine: ConsensusEngine) {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        self.slots.lock().idle.push(engine);
        self.returned.notify_one();
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        PoolStats {
            created: slots.created,
            active: self.active_count.load(Ordering::Relaxed),
            available: slots.idle.len(),
            max_size: self.max_size,
        }
    }
}

/// RAII guard - returns the engine to the pool on drop.
pub struct PooledEngine<'a> {
    engine: Option<ConsensusEngine>,
    pool: &'a EnginePool,
}

impl Deref for PooledEngine<'_> {
    type Target = ConsensusEngine;

    fn deref(&self) -> &ConsensusEngine {
        // Only `None` after drop has taken it.
        self.engine.as_ref().unwrap_or_else(|| unreachable!("pooled engine used after release"))
    }
}

impl Drop for PooledEngine<'_> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.release(engine);
        }
    }
}
