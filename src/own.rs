//! `Own<T, P>` is the move-only owner handle: it creates the block, has
//! exclusive authority over the value's lifetime, and destroys the value
//! when it is dropped, regardless of how many dependents are still alive.
//!
//! The block's memory outlives the owner's claim whenever dependents remain;
//! it is freed by whichever handle's drop observes the count word reach the
//! all-clear state.

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

use crate::block::{Block, Header, EXCLUSIVE, UNBORROWED};
use crate::borrow::{Ref, RefMut};
use crate::dep::{Dep, DepMut, Dependent};
use crate::policy::{Abort, ErrorPolicy};

/// Move-only owner of a heap value that dependents may observe.
///
/// Dropping the `Own` always runs the value's destructor, exactly once, even
/// if [`Dep`] handles are still alive; those detect the dead owner on their
/// next access instead of dereferencing freed memory. There is no way to
/// clone an `Own`: a block never has two owners.
///
/// `P` fixes the [error policy][crate::policy] at compile time. It defaults
/// to [`Abort`].
///
/// `Own` is invariant in `T`: the slot can be written through a [`DepMut`]
/// while other handles read it, so coercing the value type (e.g. shrinking
/// a lifetime inside it) must be rejected:
///
/// ```compile_fail
/// use owndep::Own;
///
/// fn shorten<'a>(own: Own<&'static str>) -> Own<&'a str> {
///     own
/// }
/// ```
pub struct Own<T, P: ErrorPolicy = Abort> {
    block: NonNull<Block<T>>,
    // fn(T) -> T forces invariance in T; without it a DepMut on a coerced
    // Own could store a short-lived value that siblings read at the
    // original, longer-lived type.
    marker: PhantomData<(T, fn(T) -> T, P)>,
}

impl<T, P: ErrorPolicy> Own<T, P> {
    /// Allocates the block and moves `value` into it.
    ///
    /// This is the only allocation the value will ever occupy; the control
    /// header (count word, borrow flag, deleter) lives in front of it.
    pub fn new(value: T) -> Self {
        Own {
            block: Block::allocate(value),
            marker: PhantomData,
        }
    }

    /// Shared, checked access to the value.
    ///
    /// Reports a violation through `P` if the value is currently mutably
    /// borrowed (through [`get_mut`][Own::get_mut] or a [`DepMut`] guard).
    pub fn get(&self) -> Ref<'_, T> {
        let h = self.header();
        P::check(h.borrows() >= UNBORROWED, "value is already mutably borrowed");
        h.set_borrows(h.borrows() + 1);
        // Safety: the block is alive for at least as long as this handle,
        // and the borrow flag now excludes exclusive access.
        Ref::new(unsafe { &*self.value_ptr() }, h.borrows_cell())
    }

    /// Exclusive, checked access to the value.
    pub fn get_mut(&mut self) -> RefMut<'_, T> {
        let h = self.header();
        P::check(h.borrows() == UNBORROWED, "value is already borrowed");
        h.set_borrows(EXCLUSIVE);
        // Safety: as in `get`, plus the flag now excludes all other access.
        RefMut::new(unsafe { &mut *self.value_ptr() }, h.borrows_cell())
    }

    /// Mints a read-only dependent handle, incrementing the dependent count.
    pub fn dep(&self) -> Dep<T, P> {
        Dependent::attach(self.block)
    }

    /// Mints a mutable dependent handle. Requires a mutable owner; a shared
    /// owner can only hand out read-only dependents.
    pub fn dep_mut(&mut self) -> DepMut<T, P> {
        Dependent::attach(self.block)
    }

    /// Number of live dependent handles on this block.
    pub fn dependent_count(&self) -> usize {
        self.header().dependents()
    }

    /// Relinquishes the block and returns the value without destroying it.
    ///
    /// Outstanding dependents keep the (now valueless) block alive and see a
    /// dead owner from here on, exactly as if the `Own` had been dropped.
    pub fn into_inner(self) -> T {
        let h = self.header();
        P::check(h.borrows() == UNBORROWED, "value is still borrowed");
        let block = self.block;
        mem::forget(self);
        // Safety: the value is initialized and unborrowed; forgetting `self`
        // above means no other path will destroy or move it.
        unsafe {
            let value = ptr::read(Block::value_ptr(block));
            let header = &(*block.as_ptr()).header;
            header.clear_owner();
            if header.all_clear() {
                Block::free(block);
            }
            value
        }
    }

    fn header(&self) -> &Header {
        // Safety: the block is alive for at least as long as this handle.
        unsafe { &(*self.block.as_ptr()).header }
    }

    fn value_ptr(&self) -> *mut T {
        // Safety: same as `header`.
        unsafe { Block::value_ptr(self.block) }
    }
}

impl<T, P: ErrorPolicy> From<T> for Own<T, P> {
    fn from(value: T) -> Self {
        Own::new(value)
    }
}

impl<T: Default, P: ErrorPolicy> Default for Own<T, P> {
    fn default() -> Self {
        Own::new(T::default())
    }
}

impl<T, P: ErrorPolicy> Drop for Own<T, P> {
    /// Destroys the value (always, exactly once), then frees the block iff
    /// no dependents remain. With dependents outstanding the block stays
    /// allocated until the last of them is dropped.
    fn drop(&mut self) {
        {
            let h = self.header();
            P::check(
                h.borrows() == UNBORROWED,
                "value is still borrowed at owner drop",
            );
            // Destruction counts as an exclusive borrow: if the value's own
            // destructor reaches back through a dependent, that access is
            // reported rather than reading a half-dead value. The flag is
            // only reset on success, so a panicking destructor leaves the
            // block borrowed (and leaked) instead of half-valid.
            h.set_borrows(EXCLUSIVE);
        }
        // Safety: the value is initialized; the deleter was bound to this
        // block at construction and runs the destructor in place only.
        unsafe { Header::drop_value_in_place(self.block.as_ptr().cast()) };
        let h = self.header();
        h.set_borrows(UNBORROWED);
        h.clear_owner();
        if h.all_clear() {
            // Safety: marker clear, no dependents, no borrows.
            unsafe { Block::free(self.block) };
        }
    }
}

impl<T: fmt::Debug, P: ErrorPolicy> fmt::Debug for Own<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.header();
        if h.borrows() == EXCLUSIVE {
            f.write_str("Own(<mutably borrowed>)")
        } else {
            h.set_borrows(h.borrows() + 1);
            // Safety: the block is alive for at least as long as this
            // handle, and the flag now excludes exclusive access for the
            // guard's lifetime.
            let r = Ref::new(unsafe { &*self.value_ptr() }, h.borrows_cell());
            f.debug_tuple("Own").field(&&*r).finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::live_blocks;
    use crate::policy::{Fast, Panic};
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    static_assertions::assert_eq_size!(Own<u64>, *const u8);
    static_assertions::assert_eq_size!(Own<String, Panic>, *const u8);

    /// Payload that counts its own drops.
    struct Probe(Rc<Cell<usize>>);
    impl Drop for Probe {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn probe() -> (Rc<Cell<usize>>, Probe) {
        let drops = Rc::new(Cell::new(0));
        (drops.clone(), Probe(drops))
    }

    #[test]
    fn create_access_and_count_dependents() {
        let own: Own<String> = Own::new("Foo".to_string());
        assert_eq!(&*own.get(), "Foo");

        let d1 = own.dep();
        let d2 = own.dep();
        assert_eq!(own.dependent_count(), 2);
        assert_eq!(&*d1.get(), "Foo");
        assert_eq!(&*d2.get(), "Foo");

        drop(d1);
        drop(d2);
        assert_eq!(own.dependent_count(), 0);
    }

    #[test]
    fn value_destroyed_exactly_once_at_owner_drop() {
        let (drops, p) = probe();
        let own: Own<Probe> = Own::new(p);
        let dep = own.dep();
        assert_eq!(drops.get(), 0);
        drop(own);
        assert_eq!(drops.get(), 1);
        drop(dep);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn block_freed_with_owner_when_no_dependents() {
        let base = live_blocks();
        let own: Own<u32> = Own::new(5);
        assert_eq!(live_blocks(), base + 1);
        drop(own);
        assert_eq!(live_blocks(), base);
    }

    #[test]
    fn block_free_deferred_to_last_dependent() {
        let base = live_blocks();
        let own: Own<u32> = Own::new(5);
        let d1 = own.dep();
        let d2 = own.dep();
        drop(own);
        assert_eq!(live_blocks(), base + 1);
        drop(d1);
        assert_eq!(live_blocks(), base + 1);
        drop(d2);
        assert_eq!(live_blocks(), base);
    }

    #[test]
    fn drop_order_independence() {
        let base = live_blocks();
        // Dependents first.
        {
            let own: Own<u32> = Own::new(1);
            let d = own.dep();
            drop(d);
            drop(own);
        }
        assert_eq!(live_blocks(), base);
        // Owner first.
        {
            let own: Own<u32> = Own::new(2);
            let d = own.dep();
            drop(own);
            drop(d);
        }
        assert_eq!(live_blocks(), base);
    }

    #[test]
    fn dead_owner_detected_and_no_leak() {
        let base = live_blocks();
        let (drops, p) = probe();
        let own: Own<Probe, Panic> = Own::new(p);
        let dep = own.dep();
        drop(own);
        assert_eq!(drops.get(), 1);
        let hit = catch_unwind(AssertUnwindSafe(|| {
            let _ = dep.get();
        }));
        assert!(hit.is_err());
        drop(dep);
        assert_eq!(live_blocks(), base);
    }

    #[test]
    fn move_assign_drops_previous_value() {
        let base = live_blocks();
        let mut a: Own<String> = Own::new("Foo".to_string());
        let b: Own<String> = Own::new("Bar".to_string());
        a = b;
        assert_eq!(&*a.get(), "Bar");
        // The "Foo" block had no dependents, so it is already gone.
        assert_eq!(live_blocks(), base + 1);
        drop(a);
        assert_eq!(live_blocks(), base);
    }

    #[test]
    fn into_inner_relinquishes_without_destroying() {
        let base = live_blocks();
        let (drops, p) = probe();
        let own: Own<Probe, Panic> = Own::new(p);
        let dep = own.dep();

        let value = own.into_inner();
        assert_eq!(drops.get(), 0);
        assert!(!dep.owner_alive());
        assert!(dep.try_get().is_none());
        assert_eq!(live_blocks(), base + 1);

        drop(dep);
        assert_eq!(live_blocks(), base);
        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn shared_borrows_stack_and_release() {
        let own: Own<u32> = Own::new(9);
        {
            let a = own.get();
            let b = own.get();
            assert_eq!(*a + *b, 18);
        }
        let mut own = own;
        *own.get_mut() += 1;
        assert_eq!(*own.get(), 10);
    }

    #[test]
    fn mutable_borrow_conflict_is_reported() {
        let mut own: Own<u32, Panic> = Own::new(1);
        let mut dm = own.dep_mut();
        let guard = dm.get_mut();
        let hit = catch_unwind(AssertUnwindSafe(|| {
            let _ = own.get();
        }));
        assert!(hit.is_err());
        drop(guard);
        drop(dm);
        *own.get_mut() = 2;
        assert_eq!(*own.get(), 2);
    }

    #[test]
    fn owner_drop_with_live_guard_leaks_instead_of_dangling() {
        let (drops, p) = probe();
        let own: Own<Probe, Panic> = Own::new(p);
        let dep = own.dep();
        let guard = dep.get();
        let hit = catch_unwind(AssertUnwindSafe(move || drop(own)));
        assert!(hit.is_err());
        // The value was not destroyed, so the guard is still backed by it.
        assert_eq!(drops.get(), 0);
        assert_eq!(guard.0.get(), 0);
    }

    #[test]
    fn debug_formats_through_a_borrow() {
        let mut own: Own<u32> = Own::new(3);
        assert_eq!(format!("{own:?}"), "Own(3)");
        let mut dm = own.dep_mut();
        let g = dm.get_mut();
        assert_eq!(format!("{own:?}"), "Own(<mutably borrowed>)");
        drop(g);
        drop(dm);
    }

    #[test]
    fn fast_policy_owner_side_is_unchanged() {
        let own: Own<u32, Fast> = Own::new(4);
        let d = own.dep();
        assert_eq!(own.dependent_count(), 1);
        assert_eq!(*d.get(), 4);
        drop(d);
        assert_eq!(own.dependent_count(), 0);
    }
}
