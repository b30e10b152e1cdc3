use std::cell::UnsafeCell;
use std::fmt::{self, Debug};

use crossbeam_utils::CachePadded;

use crate::fatal_check;
use crate::version::Version;

// Reads only observe the writer epoch, so any number of them may overlap. Writes and accesses
// bump both epochs and must not overlap with anything; a moved epoch after the body aborts.
pub struct Checker<T> {
    writer: CachePadded<Version>,
    reader: CachePadded<Version>,
    value: UnsafeCell<T>,
}

// Overlapping accesses from other threads are caught by the version checks and abort.
unsafe impl<T: Send + Sync> Sync for Checker<T> {}

impl<T> Checker<T> {
    pub fn new(value: T) -> Self {
        Self::with_versions(value, 0, 0)
    }

    pub(crate) fn with_versions(value: T, writer: u64, reader: u64) -> Self {
        Self {
            writer: CachePadded::new(Version::starting_at(writer)),
            reader: CachePadded::new(Version::starting_at(reader)),
            value: UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> T
    where
        T: Clone,
    {
        self.read_only_access(T::clone)
    }

    // The previous value is dropped inside the bracket.
    pub fn write(&self, value: T) {
        self.access(move |current| *current = value);
    }

    pub fn read_only_access<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let writer = self.writer.current();

        let result = f(unsafe { &*self.value.get() });

        fatal_check!(
            writer == self.writer.current(),
            "concurrent write during read (writer epoch {} -> {})",
            writer,
            self.writer.current()
        );

        result
    }

    pub fn access<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let writer = self.writer.bump();
        let reader = self.reader.bump();

        let result = f(unsafe { &mut *self.value.get() });

        fatal_check!(
            writer == self.writer.current() && reader == self.reader.current(),
            "concurrent access during write (writer epoch {} -> {}, reader epoch {} -> {})",
            writer,
            self.writer.current(),
            reader,
            self.reader.current()
        );

        result
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    pub fn writer_version(&self) -> u64 {
        self.writer.current()
    }

    pub fn reader_version(&self) -> u64 {
        self.reader.current()
    }
}

impl<T: Default> Default for Checker<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Checker<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

// The value itself is left out: looking at it would be an unbracketed read.
impl<T> Debug for Checker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker")
            .field("writer", &self.writer_version())
            .field("reader", &self.reader_version())
            .finish_non_exhaustive()
    }
}
