/*!
This crate provides a single-allocation ownership/dependency pointer pair:
one move-only owner handle, [`Own<T>`], and any number of copyable dependent
handles, [`Dep<T>`] and [`DepMut<T>`], which observe the value without owning
it and are safe to outlive, or be outlived by, the owner.

The shape of the problem: a value is shared across components whose relative
destruction order is not statically known (a parent holding children that
hand references to grandchildren, say), and you want

- a single heap allocation for control data and value,
- deterministic value destruction, exactly when the owner goes away,
- a detected error, not undefined behavior, if a dependent is used after
  the owner is gone.

`Rc`/`Weak` gives you the last two only by surrendering the first and by
making destruction timing depend on whoever drops the last strong pointer.
Here the owner is the only strong pointer, so dropping it always destroys
the value, while live dependents merely keep the (now valueless) block
allocated until the last of them is dropped:

```rust
use owndep::Own;

let owner: Own<String> = Own::new("hello".to_string());
assert_eq!(&*owner.get(), "hello");

let dep = owner.dep();
assert_eq!(owner.dependent_count(), 1);
assert_eq!(&*dep.get(), "hello");

drop(owner);                    // the String is destroyed here
assert!(!dep.owner_alive());    // the block is still allocated...
assert!(dep.try_get().is_none());
drop(dep);                      // ...and freed here
```

# Checked access

Access is an explicit borrow returning a guard, in the `RefCell` style.
That is what makes "dependent outlives owner" safe rather than merely
detected-sometimes: while a guard is live the owner's destructor refuses to
destroy the value (a reported violation), and once the owner is gone every
later access through a dependent is a reported violation too.

Mutable dependents can only be minted from a mutable owner, and exclusive
guards conflict with everything else at runtime:

```rust
use owndep::Own;

let mut owner: Own<Vec<i32>> = Own::new(vec![1, 2]);
let mut tail = owner.dep_mut();
tail.get_mut().push(3);
assert_eq!(*owner.get(), vec![1, 2, 3]);
```

# Error policies

Every lifetime check funnels through an [`ErrorPolicy`] chosen as a type
parameter, so the response to a violation (abort, panic, ...) is fixed at
compile time with no runtime indirection. [`Abort`] is the default;
[`Panic`] unwinds and is what the test suites use; you can supply your own:

```rust
use owndep::{ErrorPolicy, Own};

struct Loud;
impl ErrorPolicy for Loud {
    const RESET_ON_TAKE: bool = true;
    fn violation(reason: &'static str) -> ! {
        panic!("boom: {reason}");
    }
}

let owner: Own<u8, Loud> = Own::new(1);
let mut dep = owner.dep();
let moved = dep.take();        // safe discipline: the source detaches
assert!(dep.is_detached());
assert_eq!(*moved.get(), 1);
```

The policy also fixes the *take discipline*: what happens to the source
handle when [`Dependent::take`] splits a new handle off it. The safe
discipline (above) detaches the source and leaves the count alone. The fast
discipline keeps the source bound and bumps the count, so the source never
needs a detached check on access and its own drop rebalances the books:

```rust
use owndep::{policy::Fast, Own};

let owner: Own<u8, Fast> = Own::new(1);
let mut dep = owner.dep();
let moved = dep.take();        // fast discipline: both stay bound
assert_eq!(owner.dependent_count(), 2);
assert_eq!(*dep.get(), 1);
assert_eq!(*moved.get(), 1);
```

Both disciplines are deliberate, independently testable configurations;
client code may rely on either guarantee.

# Differences from `std`

- Unlike `Rc<RefCell<T>>`, this is one allocation, the owner is unique and
  move-only, and value destruction happens at owner drop no matter how many
  dependents remain.
- Unlike `Weak::upgrade`, a dependent does not extend the value's lifetime;
  [`Dep::get`][Dependent::get] hands out a scoped guard, never a new strong
  reference.
- `Own::new(value)` moves the value into the block; there is no two-step
  `MaybeUninit` surface.

# Not covered, by design

Single-threaded only: the count word and borrow flag are plain `Cell`s, and
all handles are `!Send` and `!Sync`; mutate handles for one block from one
thread (or guard them with a lock yourself). No ownership cycles, no second
owner, no allocator customization. If you need atomics across threads, you
want `Arc`, not this.
*/

mod block;
pub mod borrow;
pub mod dep;
pub mod own;
pub mod policy;

pub use self::borrow::{Ref, RefMut};
pub use self::dep::{Dep, DepMut, Dependent};
pub use self::own::Own;
pub use self::policy::{Abort, ErrorPolicy, Fast, Panic};
