//! Borrow guards returned by the access operations on [`Own`][crate::Own]
//! and [`Dep`][crate::Dep].
//!
//! Access to the shared value is an explicit, runtime-checked borrow rather
//! than a plain `Deref`: a guard marks the block's borrow flag for as long
//! as it lives, which is what lets the owner's destructor detect (and
//! report, instead of invalidating) a reference that would otherwise dangle.

use core::cell::Cell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::block::{EXCLUSIVE, UNBORROWED};

/// Shared borrow of the value behind an owner or dependent handle.
///
/// While any `Ref` is live the value cannot be mutably borrowed and the
/// owner cannot destroy it.
pub struct Ref<'b, T: ?Sized> {
    value: &'b T,
    borrows: &'b Cell<isize>,
}

impl<'b, T: ?Sized> Ref<'b, T> {
    /// Callers must already have incremented the shared borrow count.
    pub(crate) fn new(value: &'b T, borrows: &'b Cell<isize>) -> Self {
        debug_assert!(borrows.get() > 0);
        Ref { value, borrows }
    }
}

impl<T: ?Sized> Deref for Ref<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T: ?Sized> Drop for Ref<'_, T> {
    fn drop(&mut self) {
        self.borrows.set(self.borrows.get() - 1);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Ref<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Ref<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Exclusive borrow of the value behind an owner or mutable dependent.
pub struct RefMut<'b, T: ?Sized> {
    value: &'b mut T,
    borrows: &'b Cell<isize>,
}

impl<'b, T: ?Sized> RefMut<'b, T> {
    /// Callers must already have set the borrow flag to exclusive.
    pub(crate) fn new(value: &'b mut T, borrows: &'b Cell<isize>) -> Self {
        debug_assert_eq!(borrows.get(), EXCLUSIVE);
        RefMut { value, borrows }
    }
}

impl<T: ?Sized> Deref for RefMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value
    }
}

impl<T: ?Sized> DerefMut for RefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}

impl<T: ?Sized> Drop for RefMut<'_, T> {
    fn drop(&mut self) {
        debug_assert_eq!(self.borrows.get(), EXCLUSIVE);
        self.borrows.set(UNBORROWED);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RefMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for RefMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
