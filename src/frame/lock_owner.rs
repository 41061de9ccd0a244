/// Identifies whoever currently holds (or is releasing) a channel's
/// advisory lock. The original design used a raw pointer as an identity
/// token; a caller-chosen `u64` does the same job without the unsafety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner(pub u64);

impl LockOwner {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}
