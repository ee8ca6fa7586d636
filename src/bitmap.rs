//! Compressed combination-id sets. A thin, evaluator-facing wrapper around
//! [`roaring::RoaringBitmap`] (run-container / array-container / bitmap-
//! container hybrid) that exposes exactly the operations the engine model
//! and evaluator need, including writing an intersection into a
//! preallocated output bitmap so scratch buffers can be reused.

use roaring::RoaringBitmap;

/// A posting list / eligibility set over combination ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinationBitmap(RoaringBitmap);

impl CombinationBitmap {
    pub fn new() -> Self {
        Self(RoaringBitmap::new())
    }

    /// The full `[0..n)` range, used when no base-condition set applies to
    /// an event (C8 step 3).
    pub fn full_range(n: u32) -> Self {
        let mut bitmap = RoaringBitmap::new();
        if n > 0 {
            bitmap.insert_range(0..n);
        }
        Self(bitmap)
    }

    pub fn add(&mut self, id: u32) {
        self.0.insert(id);
    }

    pub fn remove(&mut self, id: u32) {
        self.0.remove(id);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.0.contains(id)
    }

    pub fn cardinality(&self) -> u64 {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iterate(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter()
    }

    /// Unions `other` into `self` in place.
    pub fn or_into(&mut self, other: &CombinationBitmap) {
        self.0 |= &other.0;
    }

    /// Removes every member of `other` from `self` in place.
    pub fn subtract_into(&mut self, other: &CombinationBitmap) {
        self.0 -= &other.0;
    }

    /// Computes `a AND b`, writing the result into `out` (clearing it
    /// first). Letting the caller pass a preallocated scratch bitmap
    /// avoids an allocation per intersection on the hot path.
    pub fn and(a: &CombinationBitmap, b: &CombinationBitmap, out: &mut CombinationBitmap) {
        out.0.clear();
        out.0 = &a.0 & &b.0;
    }

    pub fn union_of<'a>(bitmaps: impl Iterator<Item = &'a CombinationBitmap>) -> Self {
        let mut out = RoaringBitmap::new();
        for bitmap in bitmaps {
            out |= &bitmap.0;
        }
        Self(out)
    }
}

impl FromIterator<u32> for CombinationBitmap {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self(RoaringBitmap::from_iter(iter))
    }
}
