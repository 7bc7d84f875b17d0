//! A memoization cache shared by instancers.
//!
//! Keys are built from argument values plus the identity of the owning
//! instancer, so two instancers over the same document never share entries.
//! Each key gets its own lock and at most one computation runs per key.

use std::{
    any::Any,
    collections::{BTreeSet, HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use fontvary::coords::{DesignAnisoLocation, DiscreteLocation};
use log::trace;
use parking_lot::Mutex;
use smol_str::SmolStr;

use crate::{config::Flags, error::Error, kerning::KernPair, types::GlyphName};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Identifies the instancer an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// A never before seen id.
    pub fn next() -> OwnerId {
        OwnerId(NEXT_OWNER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    GlyphModel,
    MakeOneGlyph,
    InfoModel,
    KerningModel,
    LibModel,
}

impl Operation {
    /// Operations whose entries are about one glyph.
    pub fn is_glyph_scoped(&self) -> bool {
        matches!(self, Operation::GlyphModel | Operation::MakeOneGlyph)
    }
}

/// Everything that distinguishes one cached result from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub owner: OwnerId,
    pub operation: Operation,
    /// The glyph, for glyph scoped operations.
    pub entity: Option<SmolStr>,
    pub discrete: Option<DiscreteLocation>,
    pub location: Option<DesignAnisoLocation>,
    pub pairs: Option<BTreeSet<KernPair>>,
    /// Any boolean options, packed.
    pub flags: Flags,
}

impl CacheKey {
    pub fn new(owner: OwnerId, operation: Operation) -> CacheKey {
        CacheKey {
            owner,
            operation,
            entity: None,
            discrete: None,
            location: None,
            pairs: None,
            flags: Flags::empty(),
        }
    }

    pub fn entity(mut self, entity: impl Into<SmolStr>) -> CacheKey {
        self.entity = Some(entity.into());
        self
    }

    pub fn discrete(mut self, discrete: Option<&DiscreteLocation>) -> CacheKey {
        self.discrete = discrete.cloned();
        self
    }

    pub fn location(mut self, location: &DesignAnisoLocation) -> CacheKey {
        self.location = Some(location.clone());
        self
    }

    pub fn pairs(mut self, pairs: Option<&BTreeSet<KernPair>>) -> CacheKey {
        self.pairs = pairs.cloned();
        self
    }

    pub fn flags(mut self, flags: Flags) -> CacheKey {
        self.flags = flags;
        self
    }
}

/// Who refers to whom, for cascading invalidation.
pub trait DependencyIndex {
    /// Entities that directly reference name.
    fn dependents(&self, name: &str) -> BTreeSet<SmolStr>;
}

impl DependencyIndex for HashMap<GlyphName, BTreeSet<GlyphName>> {
    fn dependents(&self, name: &str) -> BTreeSet<SmolStr> {
        self.get(name)
            .map(|users| users.iter().map(|g| g.clone().into_inner()).collect())
            .unwrap_or_default()
    }
}

/// name plus everything that references it, directly or not.
pub fn with_dependents(name: &str, index: &dyn DependencyIndex) -> BTreeSet<SmolStr> {
    let mut seen = BTreeSet::from([SmolStr::new(name)]);
    let mut pending = VecDeque::from([SmolStr::new(name)]);
    while let Some(next) = pending.pop_front() {
        for dependent in index.dependents(&next) {
            if seen.insert(dependent.clone()) {
                pending.push_back(dependent);
            }
        }
    }
    seen
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

type Value = Arc<dyn Any + Send + Sync>;
type Slot = Arc<Mutex<Option<Value>>>;

#[derive(Default)]
pub struct Cache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cache({:?})", self.stats())
    }
}

impl Cache {
    pub fn new() -> Cache {
        Default::default()
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        self.slots.lock().entry(key.clone()).or_default().clone()
    }

    /// The cached value for key, or the result of compute which is then cached.
    ///
    /// Concurrent callers for the same key wait for the first one to finish.
    /// Errors are returned, not cached.
    pub fn get_or_compute<T, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>, Error>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, Error>,
    {
        let slot = self.slot(&key);
        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return downcast(&key, value.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!("Computing {:?} {:?}", key.operation, key.entity);
        let value = match compute() {
            Ok(value) => Arc::new(value),
            Err(e) => {
                drop(guard);
                self.discard_empty(&key, &slot);
                return Err(e);
            }
        };
        *guard = Some(value.clone());
        Ok(value)
    }

    // A failed computation leaves nothing behind. try_lock because a slot
    // that is locked has another caller computing into it.
    fn discard_empty(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots.lock();
        let still_empty = slots
            .get(key)
            .filter(|current| Arc::ptr_eq(current, slot))
            .and_then(|current| current.try_lock().map(|value| value.is_none()))
            .unwrap_or(false);
        if still_empty {
            slots.remove(key);
        }
    }

    /// The cached value for key, if there is one.
    pub fn get<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Result<Option<Arc<T>>, Error> {
        let Some(slot) = self.slots.lock().get(key).cloned() else {
            return Ok(None);
        };
        let value = slot.lock().clone();
        value.map(|v| downcast(key, v)).transpose()
    }

    pub fn put<T: Send + Sync + 'static>(&self, key: CacheKey, value: T) {
        let slot: Slot = Arc::new(Mutex::new(Some(Arc::new(value))));
        self.slots.lock().insert(key, slot);
    }

    /// Drop every entry owned by owner. Returns how many went.
    pub fn invalidate_all(&self, owner: OwnerId) -> usize {
        self.remove_where(|key| key.owner == owner)
    }

    /// Drop owner's glyph scoped entries for entity.
    ///
    /// With an index the entities that reference it, directly or through
    /// other references, go too. Returns how many entries went.
    pub fn invalidate_entity(
        &self,
        owner: OwnerId,
        entity: &str,
        cascade: Option<&dyn DependencyIndex>,
    ) -> usize {
        let names = match cascade {
            Some(index) => with_dependents(entity, index),
            None => BTreeSet::from([SmolStr::new(entity)]),
        };
        self.remove_where(|key| {
            key.owner == owner
                && key.operation.is_glyph_scoped()
                && key
                    .entity
                    .as_ref()
                    .map(|e| names.contains(e))
                    .unwrap_or(false)
        })
    }

    // Removing the slot under the map lock means a read that starts later
    // builds a new slot; a computation still running on the old one can't
    // leak into it.
    fn remove_where(&self, pred: impl Fn(&CacheKey) -> bool) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, _| !pred(key));
        before - slots.len()
    }

    /// Keys owned by owner.
    pub fn keys(&self, owner: OwnerId) -> Vec<CacheKey> {
        self.slots
            .lock()
            .keys()
            .filter(|key| key.owner == owner)
            .cloned()
            .collect()
    }

    /// Entities with glyph scoped entries owned by owner, sorted.
    pub fn entities(&self, owner: OwnerId) -> Vec<SmolStr> {
        self.keys(owner)
            .into_iter()
            .filter(|key| key.operation.is_glyph_scoped())
            .filter_map(|key| key.entity)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.slots.lock().len(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &CacheKey, value: Value) -> Result<Arc<T>, Error> {
    value
        .downcast::<T>()
        .map_err(|_| Error::CacheConsistency(format!("{:?} {:?}", key.operation, key.entity)))
}
