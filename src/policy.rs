//! Error policies: how lifetime violations are reported, and which
//! discipline [`take`][crate::Dependent::take] uses for the source handle.
//!
//! Every runtime check in the crate funnels through a single policy type
//! chosen when the handles are instantiated: `Own<T, MyPolicy>`. The policy
//! decides how a violation surfaces (abort, panic, ...); the handles only
//! decide *what* is checked.

/// Strategy for reporting lifetime violations, supplied as a type parameter
/// to [`Own`][crate::Own] and [`Dep`][crate::Dep].
///
/// A violation is never a recoverable data error; it means client code broke
/// a handle-lifetime rule (used a detached dependent, used a dependent after
/// its owner was dropped, overlapped borrows). `violation` must diverge:
/// letting execution continue past a failed check would hand out a reference
/// to freed or aliased memory, so a silent no-op policy cannot be expressed.
/// Panicking policies are recoverable via unwinding, which is what the test
/// suites use.
pub trait ErrorPolicy {
    /// Discipline for [`Dependent::take`][crate::Dependent::take].
    ///
    /// `true` (safe): the source handle is detached by `take`; the dependent
    /// count is unchanged and any later access through the source is a
    /// checked violation.
    ///
    /// `false` (fast): the source stays bound and `take` increments the
    /// dependent count, like a clone. The source never needs a detached
    /// check on access, at the price of keeping the block referenced until
    /// the source is dropped.
    const RESET_ON_TAKE: bool;

    /// Report a violated invariant. Must not return.
    fn violation(reason: &'static str) -> !;

    /// Funnel for every lifetime check.
    #[inline]
    fn check(condition: bool, reason: &'static str) {
        if !condition {
            Self::violation(reason);
        }
    }
}

/// Default policy: safe take discipline, aborts the process on violation.
///
/// Aborting (rather than unwinding) is the right default for code that does
/// not expect to recover: a violation may be detected inside a destructor,
/// where unwinding would escalate to an abort anyway.
#[derive(Clone, Copy, Debug, Default)]
pub struct Abort;

impl ErrorPolicy for Abort {
    const RESET_ON_TAKE: bool = true;

    #[cold]
    fn violation(reason: &'static str) -> ! {
        eprintln!("owndep: lifetime violation: {reason}");
        std::process::abort();
    }
}

/// Safe take discipline, panics on violation.
///
/// The panic unwinds, so violations can be observed with
/// `std::panic::catch_unwind` or `#[should_panic]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Panic;

impl ErrorPolicy for Panic {
    const RESET_ON_TAKE: bool = true;

    #[cold]
    fn violation(reason: &'static str) -> ! {
        panic!("lifetime violation: {reason}");
    }
}

/// Fast take discipline, panics on the checks that remain.
///
/// With this policy `take` leaves its source bound to the same block and
/// bumps the dependent count; the source's own drop rebalances it. Client
/// code that takes from a handle and keeps using the source gets the value,
/// not an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fast;

impl ErrorPolicy for Fast {
    const RESET_ON_TAKE: bool = false;

    #[cold]
    fn violation(reason: &'static str) -> ! {
        panic!("lifetime violation: {reason}");
    }
}
