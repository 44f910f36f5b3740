//! # Stackful Fibers
//!
//! Cooperative user-space execution contexts over POSIX `ucontext`
//! (`getcontext` / `makecontext` / `swapcontext`).
//!
//! Each worker thread converts itself into a scheduler fiber once at
//! startup; every job then runs on a freshly created fiber with a small
//! dedicated stack. A fiber that waits switches back to the scheduler
//! fiber and is resumed — possibly on a different worker thread — when the
//! awaited job completes.
//!
//! ## Safety
//!
//! This module is unavoidably unsafe: it saves and restores register
//! state. The invariants the rest of the crate maintains:
//!
//! - a `Fiber` is switched to by at most one thread at a time;
//! - a fiber's context is fully saved (the `swapcontext` call returned on
//!   the other side) before anything can resume it;
//! - a `Fiber` is never dropped while it is the executing context;
//! - entry functions never return — they switch away forever.
//!
//! `ucontext_t` on glibc contains interior pointers (the FP register save
//! area), so contexts are boxed and never move after initialisation.

#![allow(unsafe_code)]

use std::mem::MaybeUninit;

use libc::{c_uint, c_void, getcontext, makecontext, swapcontext, ucontext_t};

/// Stack size for job fibers: 32 KiB.
pub const JOB_FIBER_STACK_BYTES: usize = 32 * 1024;

/// Entry function for a fresh fiber. Must never return.
pub type FiberEntry = fn(*mut c_void);

struct EntryData {
    entry: FiberEntry,
    arg: *mut c_void,
}

/// A stackful execution context.
pub struct Fiber {
    /// Boxed because glibc's `ucontext_t` holds interior pointers.
    ctx: Box<ucontext_t>,
    /// Owned stack for created fibers; `None` for converted threads.
    #[allow(dead_code)]
    stack: Option<Box<[u8]>>,
}

impl Fiber {
    /// Wraps the calling thread's execution context so other fibers can
    /// switch back to it. Call once per worker thread.
    ///
    /// The context content is filled in by the first switch away from the
    /// thread; until then it is an empty save area.
    #[must_use]
    pub fn convert_thread() -> Self {
        // A zeroed save area: swapcontext performs a full save into it.
        let ctx = unsafe { MaybeUninit::<ucontext_t>::zeroed().assume_init() };
        Self {
            ctx: Box::new(ctx),
            stack: None,
        }
    }

    /// Creates a fiber that will run `entry(arg)` on its own stack when
    /// first switched to.
    ///
    /// `entry` must never return; a fiber finishes by switching to another
    /// fiber and never being resumed.
    ///
    /// # Panics
    ///
    /// Panics if the platform refuses to initialise the context.
    #[must_use]
    pub fn new(entry: FiberEntry, arg: *mut c_void, stack_bytes: usize) -> Self {
        let mut ctx = Box::new(unsafe { MaybeUninit::<ucontext_t>::zeroed().assume_init() });
        let stack = vec![0u8; stack_bytes].into_boxed_slice();

        let rc = unsafe { getcontext(&mut *ctx) };
        assert_eq!(rc, 0, "getcontext failed");

        ctx.uc_stack.ss_sp = stack.as_ptr() as *mut c_void;
        ctx.uc_stack.ss_size = stack_bytes;
        ctx.uc_stack.ss_flags = 0;
        // No successor context: the trampoline never returns.
        ctx.uc_link = std::ptr::null_mut();

        let data = Box::into_raw(Box::new(EntryData { entry, arg }));
        let hi = ((data as usize) >> 32) as c_uint;
        let lo = (data as usize) as c_uint;

        unsafe {
            // makecontext passes arguments as C ints, so the payload
            // pointer travels as two 32-bit halves.
            let trampoline = std::mem::transmute::<extern "C" fn(c_uint, c_uint), extern "C" fn()>(
                fiber_trampoline,
            );
            makecontext(&mut *ctx, trampoline, 2, hi, lo);
        }

        Self {
            ctx,
            stack: Some(stack),
        }
    }
}

extern "C" fn fiber_trampoline(hi: c_uint, lo: c_uint) {
    let bits = ((hi as usize) << 32) | lo as usize;
    let data = unsafe { Box::from_raw(bits as *mut EntryData) };
    (data.entry)(data.arg);
    unreachable!("fiber entry returned");
}

/// Switches execution from `from` to `to`, saving the current state into
/// `from`. Returns when some fiber switches back to `from`.
///
/// # Safety
///
/// `from` must be the fiber currently executing on this thread; `to` must
/// be a fiber that is not executing anywhere. Both pointers must stay
/// valid until the switch completes on both sides.
pub unsafe fn switch(from: *mut Fiber, to: *const Fiber) {
    let rc = swapcontext(&mut *(*from).ctx, &*(*to).ctx);
    debug_assert_eq!(rc, 0, "swapcontext failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TRACE: AtomicU32 = AtomicU32::new(0);
    static mut MAIN_FIBER: *mut Fiber = std::ptr::null_mut();
    static mut WORK_FIBER: *mut Fiber = std::ptr::null_mut();

    fn ping_pong_entry(arg: *mut c_void) {
        let value = arg as usize as u32;
        TRACE.store(value, Ordering::SeqCst);
        unsafe {
            // First yield back, expecting to be resumed once more.
            switch(WORK_FIBER, MAIN_FIBER);
            TRACE.store(value + 1, Ordering::SeqCst);
            switch(WORK_FIBER, MAIN_FIBER);
        }
        unreachable!();
    }

    #[test]
    fn test_switch_runs_entry_and_resumes() {
        let mut main = Fiber::convert_thread();
        let mut work = Fiber::new(ping_pong_entry, 41usize as *mut c_void, JOB_FIBER_STACK_BYTES);

        unsafe {
            MAIN_FIBER = &mut main;
            WORK_FIBER = &mut work;

            switch(&mut main, &work);
            assert_eq!(TRACE.load(Ordering::SeqCst), 41);

            switch(&mut main, &work);
            assert_eq!(TRACE.load(Ordering::SeqCst), 42);
        }
        // `work` is suspended inside its second yield; dropping it frees
        // the stack without resuming.
    }
}
