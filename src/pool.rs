//! Object Pools (C12): thread-local scratch buffers reused across event
//! evaluations so the hot path allocates nothing per event. Each pool is
//! a small stack of previously-released buffers; a borrow either pops a
//! reused buffer or allocates a fresh one, and returns it to the
//! thread-local stack on drop.

use std::cell::RefCell;

use crate::bitmap::CombinationBitmap;

thread_local! {
    static COUNTER_POOL: RefCell<Vec<Vec<u32>>> = const { RefCell::new(Vec::new()) };
    static TOUCHED_POOL: RefCell<Vec<Vec<u32>>> = const { RefCell::new(Vec::new()) };
    static BITMAP_POOL: RefCell<Vec<CombinationBitmap>> = const { RefCell::new(Vec::new()) };
}

/// A borrowed counter array, sized to the model's combination count and
/// zeroed on acquire. Returned to the thread-local pool on drop.
pub struct CounterGuard {
    buffer: Option<Vec<u32>>,
}

impl CounterGuard {
    pub fn acquire(len: usize) -> Self {
        let mut buffer = COUNTER_POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default();
        buffer.clear();
        buffer.resize(len, 0);
        Self { buffer: Some(buffer) }
    }
}

impl std::ops::Deref for CounterGuard {
    type Target = Vec<u32>;
    fn deref(&self) -> &Self::Target {
        self.buffer.as_ref().expect("counter guard buffer taken")
    }
}

impl std::ops::DerefMut for CounterGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_mut().expect("counter guard buffer taken")
    }
}

impl Drop for CounterGuard {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            COUNTER_POOL.with(|pool| pool.borrow_mut().push(buffer));
        }
    }
}

/// A borrowed scratch list of touched combination ids, cleared on
/// acquire. Used by the evaluator to know which counters need resetting
/// after an event without zeroing the whole counter array.
pub struct TouchedGuard {
    buffer: Option<Vec<u32>>,
}

impl TouchedGuard {
    pub fn acquire() -> Self {
        let mut buffer = TOUCHED_POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default();
        buffer.clear();
        Self { buffer: Some(buffer) }
    }
}

impl std::ops::Deref for TouchedGuard {
    type Target = Vec<u32>;
    fn deref(&self) -> &Self::Target {
        self.buffer.as_ref().expect("touched guard buffer taken")
    }
}

impl std::ops::DerefMut for TouchedGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_mut().expect("touched guard buffer taken")
    }
}

impl Drop for TouchedGuard {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            TOUCHED_POOL.with(|pool| pool.borrow_mut().push(buffer));
        }
    }
}

/// A borrowed scratch bitmap for intersection output, cleared on
/// acquire.
pub struct BitmapGuard {
    bitmap: Option<CombinationBitmap>,
}

impl BitmapGuard {
    pub fn acquire() -> Self {
        let mut bitmap = BITMAP_POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default();
        bitmap.clear();
        Self { bitmap: Some(bitmap) }
    }
}

impl std::ops::Deref for BitmapGuard {
    type Target = CombinationBitmap;
    fn deref(&self) -> &Self::Target {
        self.bitmap.as_ref().expect("bitmap guard taken")
    }
}

impl std::ops::DerefMut for BitmapGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.bitmap.as_mut().expect("bitmap guard taken")
    }
}

impl Drop for BitmapGuard {
    fn drop(&mut self) {
        if let Some(bitmap) = self.bitmap.take() {
            BITMAP_POOL.with(|pool| pool.borrow_mut().push(bitmap));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_guard_is_zeroed_and_sized() {
        let guard = CounterGuard::acquire(10);
        assert_eq!(guard.len(), 10);
        assert!(guard.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_counter_guard_is_reused_after_drop() {
        {
            let mut guard = CounterGuard::acquire(4);
            guard[0] = 7;
        }
        let guard = CounterGuard::acquire(4);
        assert_eq!(guard[0], 0, "reused buffer must be re-zeroed");
    }

    #[test]
    fn test_touched_guard_starts_empty() {
        let guard = TouchedGuard::acquire();
        assert!(guard.is_empty());
    }

    #[test]
    fn test_bitmap_guard_starts_cleared() {
        let mut first = BitmapGuard::acquire();
        first.add(5);
        drop(first);
        let second = BitmapGuard::acquire();
        assert!(second.is_empty());
    }
}
