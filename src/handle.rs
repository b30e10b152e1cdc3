use std::fmt::{self, Debug};

use crossbeam_utils::CachePadded;

use crate::checker::Checker;
use crate::fatal_check;
use crate::sync::{AtomicU64, Ordering};

// Only handles move the count.
pub(crate) trait RefCounted {
    fn acquire(&self);
    fn release(&self);
}

// Handles borrow the container. Ones that escape the count (mem::forget) are caught on drop.
pub struct Shared<T> {
    checker: Checker<T>,
    refs: CachePadded<AtomicU64>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        tracing::trace!(type_name = std::any::type_name::<T>(), "shared value created");

        Self {
            checker: Checker::new(value),
            refs: CachePadded::new(AtomicU64::new(0)),
        }
    }

    pub fn get_ref(&self) -> Ref<'_, T> {
        Ref::new(self)
    }

    pub fn get_read_ref(&self) -> ReadRef<'_, T> {
        ReadRef { inner: self.get_ref() }
    }

    pub fn live_refs(&self) -> u64 {
        self.refs.load(Ordering::SeqCst)
    }
}

impl<T> RefCounted for Shared<T> {
    fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let previous = self.refs.fetch_sub(1, Ordering::SeqCst);
        fatal_check!(previous > 0, "handle released with no handle outstanding");
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let refs = self.live_refs();
        tracing::trace!(refs, "shared value dropped");

        fatal_check!(refs == 0, "shared value dropped with {} live handle(s)", refs);
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("checker", &self.checker)
            .field("refs", &self.live_refs())
            .finish()
    }
}

pub struct Ref<'a, T> {
    owner: &'a Shared<T>,
}

impl<'a, T> Ref<'a, T> {
    fn new(owner: &'a Shared<T>) -> Self {
        owner.acquire();
        Self { owner }
    }

    fn checker(&self) -> &'a Checker<T> {
        &self.owner.checker
    }

    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.checker().read()
    }

    pub fn write(&self, value: T) {
        self.checker().write(value)
    }

    pub fn read_only_access<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.checker().read_only_access(f)
    }

    pub fn access<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.checker().access(f)
    }
}

impl<T> Clone for Ref<'_, T> {
    fn clone(&self) -> Self {
        Ref::new(self.owner)
    }
}

impl<T> Drop for Ref<'_, T> {
    fn drop(&mut self) {
        self.owner.release();
    }
}

impl<T> Debug for Ref<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref").field("owner", self.owner).finish()
    }
}

pub struct ReadRef<'a, T> {
    inner: Ref<'a, T>,
}

impl<T> ReadRef<'_, T> {
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.inner.read()
    }

    pub fn read_only_access<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.read_only_access(f)
    }
}

impl<T> Clone for ReadRef<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, T> From<Ref<'a, T>> for ReadRef<'a, T> {
    fn from(inner: Ref<'a, T>) -> Self {
        Self { inner }
    }
}

impl<T> Debug for ReadRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRef")
            .field("owner", self.inner.owner)
            .finish()
    }
}
