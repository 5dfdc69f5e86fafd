/*!
 * Timestamp-derived record ids.
 *
 * Ids are milliseconds since the Unix epoch, bumped past the last issued
 * value whenever two requests land in the same millisecond. The generator
 * is seeded with the largest id already in the store so a clock that moves
 * backwards between runs cannot reissue an existing id.
 */

use chrono::Utc;
use parking_lot::Mutex;

use crate::errors::StoreError;

/// Monotonic id source shared by every collection
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<i64>,
}

impl IdGenerator {
    /// Create a generator that never issues an id at or below `floor`
    pub fn new(floor: i64) -> Self {
        Self {
            last: Mutex::new(floor),
        }
    }

    /// Issue the next id: `max(now_ms, last + 1)`
    pub fn next(&self) -> Result<i64, StoreError> {
        self.next_block(1)
    }

    /// Reserve `count` consecutive ids and return the first.
    ///
    /// The caller owns `base..base + count`. Fails with `IdsExhausted` when
    /// the block would run past `i64::MAX`; the floor is left unchanged.
    pub fn next_block(&self, count: usize) -> Result<i64, StoreError> {
        let mut last = self.last.lock();
        let exhausted = || StoreError::IdsExhausted { last: *last };

        let span = i64::try_from(count.max(1) - 1).map_err(|_| exhausted())?;
        let base = last
            .checked_add(1)
            .ok_or_else(exhausted)?
            .max(Utc::now().timestamp_millis());
        let end = base.checked_add(span).ok_or_else(exhausted)?;

        *last = end;
        Ok(base)
    }

    /// Raise the floor after ids were written from outside the generator
    pub fn observe(&self, id: i64) {
        let mut last = self.last.lock();
        if id > *last {
            *last = id;
        }
    }

    /// Last id handed out or observed
    pub fn last(&self) -> i64 {
        *self.last.lock()
    }
}
