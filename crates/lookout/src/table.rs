use crate::{Error, LookupStatus, OsRandom, RandSource, Result};
use std::{collections::HashMap, sync::Arc};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Number of inserts between build progress events.
pub const BUILD_PROGRESS_INTERVAL: usize = 10_000;

/// The mutable half of table construction.
///
/// A [`TableBuilder`] is owned by exactly one thread. It is consumed by
/// [`TableBuilder::finish`] (or [`TableBuilder::publish`]) to produce a
/// [`SharedTable`], after which no further mutation is possible.
#[derive(Debug, Default)]
pub struct TableBuilder {
    map: HashMap<u64, u64>,
    inserted: usize,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with room for at least `capacity` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the reservation fails.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut map = HashMap::new();
        map.try_reserve(capacity)
            .map_err(|_| Error::Allocation {
                requested: capacity,
            })?;
        Ok(Self { map, inserted: 0 })
    }

    /// Inserts a pair, returning the value it replaced. Last write wins.
    pub fn insert(&mut self, key: u64, value: u64) -> Option<u64> {
        self.inserted += 1;
        self.map.insert(key, value)
    }

    /// Number of distinct keys so far.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Freezes the builder into an immutable [`SharedTable`].
    pub fn finish(self) -> SharedTable {
        SharedTable {
            map: self.map,
            inserted: self.inserted,
        }
    }

    /// Freezes the builder and publishes the table for concurrent readers.
    pub fn publish(self) -> Arc<SharedTable> {
        self.finish().publish()
    }
}

impl Extend<(u64, u64)> for TableBuilder {
    fn extend<I: IntoIterator<Item = (u64, u64)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// An immutable `u64 -> u64` mapping shared by every lookup worker.
///
/// Once built, a [`SharedTable`] exposes no way to mutate its contents, so any
/// number of threads may read it concurrently without locking.
///
/// ## Publication
///
/// Workers only ever see the table through an [`Arc<SharedTable>`] handed to
/// them at spawn time. Construction completes on the building thread before
/// the `Arc` exists, and spawning a thread synchronizes with everything the
/// spawning thread did before it, so every worker observes a fully built
/// table on its first read.
///
/// ## Features
///
/// - ✅ Thread-safe reads (`Send + Sync`)
/// - ✅ Expected O(1) lookups
/// - ❌ No mutation after construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedTable {
    map: HashMap<u64, u64>,
    inserted: usize,
}

impl SharedTable {
    /// Builds a table of `count` random pairs using a generator seeded from
    /// OS entropy.
    ///
    /// # Errors
    ///
    /// - [`Error::Entropy`] if the OS cannot seed the generator.
    /// - [`Error::Allocation`] if room for `count` pairs cannot be reserved.
    pub fn build(count: usize) -> Result<Self> {
        let mut rng = OsRandom::new()?;
        Self::build_with(count, &mut rng)
    }

    /// Builds a table by performing exactly `count` inserts of pairs drawn
    /// from `rng`.
    ///
    /// Keys are drawn uniformly from the full `u64` range, so a duplicate key
    /// is possible but vanishingly rare; the later value wins and
    /// [`SharedTable::len`] ends up below `count`.
    ///
    /// # Example
    /// ```
    /// use lookout::{SeededRandom, SharedTable};
    ///
    /// let a = SharedTable::build_with(1_000, &mut SeededRandom::new(1)).unwrap();
    /// let b = SharedTable::build_with(1_000, &mut SeededRandom::new(1)).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.inserted(), 1_000);
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(rng)))]
    pub fn build_with<R>(count: usize, rng: &mut R) -> Result<Self>
    where
        R: RandSource<u64> + ?Sized,
    {
        let mut builder = TableBuilder::with_capacity(count)?;
        for _ in 0..count {
            let key = rng.rand();
            let value = rng.rand();
            builder.insert(key, value);

            #[cfg(feature = "tracing")]
            if builder.inserted % BUILD_PROGRESS_INTERVAL == 0 {
                tracing::debug!(
                    inserted = builder.inserted,
                    distinct = builder.len(),
                    "building table"
                );
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            inserted = count,
            distinct = builder.len(),
            "table construction complete"
        );

        Ok(builder.finish())
    }

    /// Builds a table from explicit pairs. Later duplicates overwrite earlier
    /// ones.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let mut builder = TableBuilder::new();
        builder.extend(pairs);
        builder.finish()
    }

    /// Moves the table behind an [`Arc`] so it can be handed to workers.
    pub fn publish(self) -> Arc<Self> {
        #[cfg(feature = "tracing")]
        tracing::info!(entries = self.len(), "table published");
        Arc::new(self)
    }

    /// Looks up `key` without mutating anything.
    pub fn lookup(&self, key: u64) -> LookupStatus {
        self.get(key).into()
    }

    pub fn get(&self, key: u64) -> Option<u64> {
        self.map.get(&key).copied()
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.map.contains_key(&key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of insert operations performed during construction.
    ///
    /// `inserted() - len()` is the number of overwritten duplicates.
    pub const fn inserted(&self) -> usize {
        self.inserted
    }

    /// Iterates over all pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.map.iter().map(|(&k, &v)| (k, v))
    }
}

impl FromIterator<(u64, u64)> for SharedTable {
    fn from_iter<I: IntoIterator<Item = (u64, u64)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SeededRandom;
    use std::{collections::HashSet, thread::scope};

    #[test]
    fn lookup_finds_inserted_and_misses_absent() {
        let table = SharedTable::from_pairs([(1, 100), (2, 200)]);
        assert_eq!(table.lookup(1), LookupStatus::Found { value: 100 });
        assert_eq!(table.lookup(2), LookupStatus::Found { value: 200 });
        assert_eq!(table.lookup(3), LookupStatus::Missing);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn last_write_wins_on_duplicate_key() {
        let table = SharedTable::from_pairs([(5, 1), (6, 2), (5, 3)]);
        assert_eq!(table.get(5), Some(3));
        assert_eq!(table.len(), 2);
        assert_eq!(table.inserted(), 3);
    }

    #[test]
    fn build_with_returns_last_written_value_for_every_key() {
        let count = 25_000;
        let table = SharedTable::build_with(count, &mut SeededRandom::new(11)).unwrap();
        assert_eq!(table.inserted(), count);

        // Replay the same stream to recover the expected final values.
        let mut replay = SeededRandom::new(11);
        let mut expected = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = replay.rand();
            let value = replay.rand();
            expected.insert(key, value);
        }

        assert_eq!(table.len(), expected.len());
        for (key, value) in expected {
            assert_eq!(table.lookup(key), LookupStatus::Found { value });
        }
    }

    #[test]
    fn build_is_deterministic_for_a_seed() {
        let a = SharedTable::build_with(5_000, &mut SeededRandom::new(4)).unwrap();
        let b = SharedTable::build_with(5_000, &mut SeededRandom::new(4)).unwrap();
        let c = SharedTable::build_with(5_000, &mut SeededRandom::new(5)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn keys_never_inserted_are_missing() {
        let table = SharedTable::build_with(10_000, &mut SeededRandom::new(21)).unwrap();
        let inserted: HashSet<u64> = table.iter().map(|(k, _)| k).collect();

        let mut keys = SeededRandom::new(0xdead_beef);
        for _ in 0..10_000 {
            let key = keys.rand();
            // A random hit on an inserted key is possible and not a defect.
            if !inserted.contains(&key) {
                assert_eq!(table.lookup(key), LookupStatus::Missing);
            }
        }
    }

    #[test]
    fn build_from_os_entropy() {
        let table = SharedTable::build(1_000).unwrap();
        assert_eq!(table.inserted(), 1_000);
        assert!(table.len() <= 1_000);
        assert!(!table.is_empty());
    }

    #[test]
    fn empty_build_is_empty() {
        let table = SharedTable::build_with(0, &mut SeededRandom::new(1)).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.inserted(), 0);
    }

    #[test]
    fn impossible_reservation_is_an_allocation_error() {
        let err = TableBuilder::with_capacity(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            Error::Allocation {
                requested: usize::MAX
            }
        );
    }

    #[test]
    fn concurrent_readers_see_the_published_table() {
        const THREADS: usize = 8;

        let table = SharedTable::build_with(20_000, &mut SeededRandom::new(8)).unwrap();
        let pairs: Vec<(u64, u64)> = table.iter().collect();
        let table = table.publish();

        scope(|s| {
            for t in 0..THREADS {
                let table = Arc::clone(&table);
                let pairs = &pairs;
                s.spawn(move || {
                    for &(key, value) in pairs.iter().skip(t).step_by(THREADS) {
                        assert_eq!(table.get(key), Some(value));
                    }
                });
            }
        });
    }

    #[test]
    fn builder_publish_freezes_contents() {
        let mut builder = TableBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.insert(1, 10), None);
        assert_eq!(builder.insert(1, 11), Some(10));
        let table = builder.publish();
        assert_eq!(table.get(1), Some(11));
        assert_eq!(table.inserted(), 2);
    }
}
