//! The single heap allocation behind an [`Own`][crate::Own] and its
//! dependents: a control header followed in place by the value.
//!
//! The header packs the dependent count and the owner-alive marker into one
//! word: the top bit is set exactly while an owner claims the block, the low
//! bits count live dependent handles. The value is destroyed when the marker
//! is cleared (owner drop); the block itself is freed when the whole word
//! reaches zero, whichever handle's drop observes that.

use core::cell::Cell;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

/// Owner-alive marker: most significant bit of the count word.
const OWNER: usize = 1 << (usize::BITS - 1);

/// Borrow flag values. Positive = that many shared borrows outstanding.
pub(crate) const UNBORROWED: isize = 0;
pub(crate) const EXCLUSIVE: isize = -1;

/// Control header at the start of every block.
///
/// `drop_value` is bound once at construction and never changes; it runs the
/// value's destructor in place without freeing the block.
pub(crate) struct Header {
    count: Cell<usize>,
    borrows: Cell<isize>,
    drop_value: unsafe fn(*mut Header),
}

impl Header {
    pub(crate) fn owner_alive(&self) -> bool {
        self.count.get() & OWNER != 0
    }

    /// Number of live dependent handles (marker masked off).
    pub(crate) fn dependents(&self) -> usize {
        self.count.get() & !OWNER
    }

    /// Marker clear and no dependents left: the block may be freed.
    pub(crate) fn all_clear(&self) -> bool {
        self.count.get() == 0
    }

    pub(crate) fn inc_dependents(&self) {
        // The count word would have to reach 2^63 live handles to collide
        // with the marker bit; each handle is at least a pointer wide, so
        // that is not reachable.
        self.count.set(self.count.get() + 1);
    }

    pub(crate) fn dec_dependents(&self) {
        debug_assert!(self.dependents() > 0);
        self.count.set(self.count.get() - 1);
    }

    /// Clears the owner-alive marker. Called exactly once per block, by the
    /// owner's drop or `into_inner`.
    pub(crate) fn clear_owner(&self) {
        debug_assert!(self.owner_alive());
        self.count.set(self.count.get() & !OWNER);
    }

    pub(crate) fn borrows(&self) -> isize {
        self.borrows.get()
    }

    pub(crate) fn set_borrows(&self, flag: isize) {
        self.borrows.set(flag);
    }

    pub(crate) fn borrows_cell(&self) -> &Cell<isize> {
        &self.borrows
    }

    /// Runs the value's destructor in place via the stored deleter.
    ///
    /// # Safety
    /// `this` must point at the header of a block whose value is still
    /// initialized, and the value must not be destroyed again afterwards.
    pub(crate) unsafe fn drop_value_in_place(this: *mut Header) {
        let f = (*this).drop_value;
        f(this);
    }
}

#[repr(C)]
pub(crate) struct Block<T> {
    pub(crate) header: Header,
    pub(crate) value: MaybeUninit<T>,
}

impl<T> Block<T> {
    /// Allocates a block with the owner-alive marker set, the deleter bound,
    /// and `value` moved into place.
    pub(crate) fn allocate(value: T) -> NonNull<Block<T>> {
        #[cfg(test)]
        LIVE_BLOCKS.with(|n| n.set(n.get() + 1));

        let b = Box::into_raw(Box::new(Block {
            header: Header {
                count: Cell::new(OWNER),
                borrows: Cell::new(UNBORROWED),
                drop_value: drop_value::<T>,
            },
            value: MaybeUninit::new(value),
        }));
        // Safety: Box::into_raw never returns null.
        unsafe { NonNull::new_unchecked(b) }
    }

    /// Pointer to the value slot, without creating a reference to it.
    ///
    /// # Safety
    /// `ptr` must point at a live block.
    pub(crate) unsafe fn value_ptr(ptr: NonNull<Block<T>>) -> *mut T {
        ptr::addr_of_mut!((*ptr.as_ptr()).value).cast()
    }

    /// Frees the block's memory.
    ///
    /// # Safety
    /// The value must already have been destroyed (or moved out), the count
    /// word must be all-clear, and no reference into the block may survive
    /// the call.
    pub(crate) unsafe fn free(ptr: NonNull<Block<T>>) {
        #[cfg(test)]
        LIVE_BLOCKS.with(|n| n.set(n.get() - 1));

        // The value is MaybeUninit, so the Box drops only the block memory.
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

unsafe fn drop_value<T>(header: *mut Header) {
    let block = header as *mut Block<T>;
    (*block).value.assume_init_drop();
}

/// Number of blocks currently allocated on this thread, for leak assertions
/// in the test suites.
#[cfg(test)]
thread_local! {
    pub(crate) static LIVE_BLOCKS: Cell<usize> = const { Cell::new(0) };
}

#[cfg(test)]
pub(crate) fn live_blocks() -> usize {
    LIVE_BLOCKS.with(Cell::get)
}
