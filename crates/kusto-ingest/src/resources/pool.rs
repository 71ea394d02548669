use std::sync::atomic::{AtomicUsize, Ordering};

/// Pool is an ordered set of interchangeable handles of one resource kind,
/// selected by deterministic round-robin. The handles are functionally
/// equivalent and the client has no load visibility, so rotation gives a
/// predictable spread.
pub struct Pool<T> {
    entries: Vec<T>,
    // Selection cursor, advanced before reading: entry 0 is returned next
    // only after a full wrap whenever the pool holds more than one entry.
    cursor: AtomicUsize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl<T: Clone> Pool<T> {
    /// Append a handle, preserving insertion order.
    pub fn add(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Return the next handle in rotation, or None if the pool is empty.
    pub fn next(&self) -> Option<T> {
        if self.entries.is_empty() {
            return None;
        }
        // The entries vector is immutable once its snapshot is published,
        // so a relaxed advance suffices.
        let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(self.entries[(cursor + 1) % self.entries.len()].clone())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_starts_at_index_one_and_wraps() {
        let mut pool = Pool::default();
        for h in ["H0", "H1", "H2"] {
            pool.add(h);
        }

        let drawn: Vec<_> = (0..5).map(|_| pool.next().unwrap()).collect();
        assert_eq!(drawn, vec!["H1", "H2", "H0", "H1", "H2"]);
    }

    #[test]
    fn single_entry_is_always_returned() {
        let mut pool = Pool::default();
        pool.add("only");

        assert_eq!(pool.next(), Some("only"));
        assert_eq!(pool.next(), Some("only"));
    }

    #[test]
    fn empty_pool_yields_none() {
        let pool = Pool::<&str>::default();
        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn n_draws_cover_every_entry() {
        let mut pool = Pool::default();
        for n in 0..7usize {
            pool.add(n);
        }

        let mut seen = vec![false; pool.len()];
        for _ in 0..pool.len() {
            seen[pool.next().unwrap()] = true;
        }
        assert!(seen.into_iter().all(|s| s));
    }
}
