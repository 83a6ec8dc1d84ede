//! Dependent handles: copyable, refcounted observers of an [`Own`]'s value.
//!
//! `Dependent<T, P, MUT>` implements both variants generically over the
//! mutability flag; [`Dep`] and [`DepMut`] are the aliases client code uses.
//! A dependent never destroys the value. It only decrements the dependent
//! count on drop and frees the block if it is the last handle standing after
//! the owner has already relinquished.

use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::block::{Block, Header, EXCLUSIVE, UNBORROWED};
use crate::borrow::{Ref, RefMut};
use crate::own::Own;
use crate::policy::{Abort, ErrorPolicy};

/// Read-only dependent handle, minted from `&Own<T, P>`.
pub type Dep<T, P = Abort> = Dependent<T, P, false>;

/// Mutable dependent handle, minted from `&mut Own<T, P>`.
pub type DepMut<T, P = Abort> = Dependent<T, P, true>;

/// Generic implementation behind [`Dep`] and [`DepMut`].
///
/// The handle is attached to its block for its whole life, with one
/// exception: under a safe-discipline policy, [`take`][Dependent::take]
/// detaches the source handle, and any later access through it is a checked
/// violation rather than undefined behavior.
///
/// Like [`Own`], dependents are invariant in `T`; a handle may not be
/// coerced to a shorter-lived value type and then used to store a value the
/// siblings would read past its end:
///
/// ```compile_fail
/// use owndep::{DepMut, Panic};
///
/// fn shorten<'a>(dep: DepMut<&'static str, Panic>) -> DepMut<&'a str, Panic> {
///     dep
/// }
/// ```
pub struct Dependent<T, P: ErrorPolicy = Abort, const MUT: bool = false> {
    block: Option<NonNull<Block<T>>>,
    // *const T keeps the handle !Send and !Sync; fn(T) -> T forces
    // invariance in T, which shared mutation through DepMut requires.
    marker: PhantomData<(*const T, fn(T) -> T, P)>,
}

impl<T, P: ErrorPolicy, const MUT: bool> Dependent<T, P, MUT> {
    /// Binds to a live owner's block, incrementing the dependent count.
    pub(crate) fn attach(block: NonNull<Block<T>>) -> Self {
        // Safety: the caller (Own) keeps the block alive across this call.
        unsafe { (*block.as_ptr()).header.inc_dependents() };
        Dependent {
            block: Some(block),
            marker: PhantomData,
        }
    }

    /// Shared, checked access to the value.
    ///
    /// Violations reported through `P`: the handle was detached by `take`,
    /// the owner has been dropped (the value no longer exists), or the value
    /// is exclusively borrowed.
    pub fn get(&self) -> Ref<'_, T> {
        let Some(block) = self.block else {
            P::violation("dependent handle is detached");
        };
        // Safety: an attached handle keeps the block alive.
        let h = unsafe { &(*block.as_ptr()).header };
        P::check(h.owner_alive(), "owner has been dropped");
        P::check(h.borrows() >= UNBORROWED, "value is already mutably borrowed");
        h.set_borrows(h.borrows() + 1);
        // Safety: owner alive means the value is initialized; the borrow
        // flag now excludes exclusive access for the guard's lifetime.
        Ref::new(unsafe { &*Block::value_ptr(block) }, h.borrows_cell())
    }

    /// Non-panicking access: `None` if the handle is detached, the owner is
    /// gone, or the value is exclusively borrowed.
    pub fn try_get(&self) -> Option<Ref<'_, T>> {
        let block = self.block?;
        // Safety: an attached handle keeps the block alive.
        let h = unsafe { &(*block.as_ptr()).header };
        if !h.owner_alive() || h.borrows() < UNBORROWED {
            return None;
        }
        h.set_borrows(h.borrows() + 1);
        // Safety: as in `get`.
        Some(Ref::new(
            unsafe { &*Block::value_ptr(block) },
            h.borrows_cell(),
        ))
    }

    /// True while the owner still claims the block (so `get` can succeed).
    pub fn owner_alive(&self) -> bool {
        match self.block {
            // Safety: an attached handle keeps the block alive.
            Some(block) => unsafe { (*block.as_ptr()).header.owner_alive() },
            None => false,
        }
    }

    /// True if this handle was detached by a safe-discipline `take`.
    pub fn is_detached(&self) -> bool {
        self.block.is_none()
    }

    /// Splits a new handle off this one, applying the policy's take
    /// discipline to the source.
    ///
    /// Safe discipline (`P::RESET_ON_TAKE`): the binding moves to the
    /// returned handle, the count is unchanged, and `self` is left detached.
    ///
    /// Fast discipline: the returned handle is a second binding (count
    /// incremented) and `self` stays usable; its own drop rebalances the
    /// count. Taking from a detached handle yields a detached handle under
    /// either discipline.
    pub fn take(&mut self) -> Self {
        let block = if P::RESET_ON_TAKE {
            self.block.take()
        } else {
            if let Some(block) = self.block {
                // Safety: an attached handle keeps the block alive.
                unsafe { (*block.as_ptr()).header.inc_dependents() };
            }
            self.block
        };
        Dependent {
            block,
            marker: PhantomData,
        }
    }

    fn header(&self) -> Option<&Header> {
        // Safety: an attached handle keeps the block alive.
        self.block.map(|b| unsafe { &(*b.as_ptr()).header })
    }
}

impl<T, P: ErrorPolicy> Dependent<T, P, true> {
    /// Exclusive, checked access to the value.
    pub fn get_mut(&mut self) -> RefMut<'_, T> {
        let Some(block) = self.block else {
            P::violation("dependent handle is detached");
        };
        // Safety: an attached handle keeps the block alive.
        let h = unsafe { &(*block.as_ptr()).header };
        P::check(h.owner_alive(), "owner has been dropped");
        P::check(h.borrows() == UNBORROWED, "value is already borrowed");
        h.set_borrows(EXCLUSIVE);
        // Safety: owner alive means the value is initialized; the flag now
        // excludes all other access for the guard's lifetime.
        RefMut::new(unsafe { &mut *Block::value_ptr(block) }, h.borrows_cell())
    }

    /// Downgrades a mutable dependent to a read-only one without touching
    /// the count; the binding transfers to the returned handle.
    pub fn shared(mut this: Self) -> Dep<T, P> {
        Dependent {
            block: this.block.take(),
            marker: PhantomData,
        }
    }
}

/// A mutable dependent can be lowered to a read-only one.
impl<T, P: ErrorPolicy> From<DepMut<T, P>> for Dep<T, P> {
    fn from(dep: DepMut<T, P>) -> Self {
        DepMut::shared(dep)
    }
}

impl<T, P: ErrorPolicy, const MUT: bool> Clone for Dependent<T, P, MUT> {
    /// Another binding to the same block; increments the dependent count.
    /// Cloning a detached handle yields a detached handle.
    fn clone(&self) -> Self {
        if let Some(block) = self.block {
            // Safety: an attached handle keeps the block alive.
            unsafe { (*block.as_ptr()).header.inc_dependents() };
        }
        Dependent {
            block: self.block,
            marker: PhantomData,
        }
    }
}

impl<T, P: ErrorPolicy, const MUT: bool> Drop for Dependent<T, P, MUT> {
    /// Decrements the dependent count; frees the block if this was the last
    /// handle and the owner already relinquished. Never destroys the value.
    fn drop(&mut self) {
        let Some(block) = self.block else { return };
        // Safety: an attached handle keeps the block alive.
        let h = unsafe { &(*block.as_ptr()).header };
        h.dec_dependents();
        if h.all_clear() {
            // Safety: marker clear and count zero; the value was already
            // destroyed by the owner, only the memory remains.
            unsafe { Block::free(block) };
        }
    }
}

impl<T, P: ErrorPolicy, const MUT: bool> fmt::Debug for Dependent<T, P, MUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.header() {
            None => "detached",
            Some(h) if h.owner_alive() => "live",
            Some(_) => "owner dropped",
        };
        if MUT {
            write!(f, "DepMut({state})")
        } else {
            write!(f, "Dep({state})")
        }
    }
}

// Minting from an owner is also expressible `From`-style.
impl<T, P: ErrorPolicy> From<&Own<T, P>> for Dep<T, P> {
    fn from(own: &Own<T, P>) -> Self {
        own.dep()
    }
}

impl<T, P: ErrorPolicy> From<&mut Own<T, P>> for DepMut<T, P> {
    fn from(own: &mut Own<T, P>) -> Self {
        own.dep_mut()
    }
}
