//! Thread creation with explicit scheduling attributes.
//!
//! `std::thread` always inherits the creator's scheduling class. Benchmark
//! threads need the opposite: the kernel must apply exactly the requested
//! policy and priority, whatever the spawning thread runs under. That requires
//! `PTHREAD_EXPLICIT_SCHED` on the attribute object, so the spawn goes through
//! `pthread_create` directly.

use std::ffi::c_void;
use std::mem::{self, MaybeUninit};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::{io, ptr, thread};

use log::debug;

use super::sched::SchedAttrs;
use crate::error::PlatformError;

/// Owned `pthread_attr_t`, destroyed on drop on every path.
struct ThreadAttr {
    raw: libc::pthread_attr_t,
}

impl ThreadAttr {
    fn new() -> Result<Self, PlatformError> {
        let mut raw = MaybeUninit::<libc::pthread_attr_t>::uninit();
        // SAFETY: pthread_attr_init initialises the pointee.
        let ret = unsafe { libc::pthread_attr_init(raw.as_mut_ptr()) };
        if ret != 0 {
            return Err(PlatformError::SchedAttr { call: "pthread_attr_init", code: ret });
        }
        // SAFETY: initialised by the successful call above.
        Ok(Self { raw: unsafe { raw.assume_init() } })
    }

    fn set_explicit_sched(&mut self, attrs: SchedAttrs) -> Result<(), PlatformError> {
        // SAFETY: sched_param is plain data.
        let mut param: libc::sched_param = unsafe { mem::zeroed() };
        param.sched_priority = attrs.priority;

        // SAFETY: `self.raw` is an initialised attribute object.
        let ret = unsafe {
            libc::pthread_attr_setinheritsched(&mut self.raw, libc::PTHREAD_EXPLICIT_SCHED)
        };
        check("pthread_attr_setinheritsched", ret)?;

        // SAFETY: as above; the policy constant comes from SchedPolicy::raw.
        let ret = unsafe { libc::pthread_attr_setschedpolicy(&mut self.raw, attrs.policy.raw()) };
        check("pthread_attr_setschedpolicy", ret)?;

        // SAFETY: as above; `param` outlives the call.
        let ret = unsafe { libc::pthread_attr_setschedparam(&mut self.raw, &param) };
        check("pthread_attr_setschedparam", ret)
    }
}

impl Drop for ThreadAttr {
    fn drop(&mut self) {
        // SAFETY: `self.raw` was initialised in new() and is destroyed once.
        unsafe {
            libc::pthread_attr_destroy(&mut self.raw);
        }
    }
}

fn check(call: &'static str, code: libc::c_int) -> Result<(), PlatformError> {
    if code == 0 {
        Ok(())
    } else {
        Err(PlatformError::SchedAttr { call, code })
    }
}

/// Slot the spawned thread writes its outcome into. Shared with the handle,
/// so whichever side finishes last frees it, joined or detached.
type Packet<T> = Arc<Mutex<Option<thread::Result<T>>>>;

/// Handle to a thread created by [`spawn_explicit`].
///
/// Dropping the handle without joining detaches the thread.
pub struct RawThread<T> {
    native: Option<libc::pthread_t>,
    packet: Packet<T>,
}

impl<T> RawThread<T> {
    /// Blocks until the thread has terminated and returns what its closure
    /// produced, or the panic payload if the closure unwound.
    pub fn join(mut self) -> Result<thread::Result<T>, PlatformError> {
        let native = self
            .native
            .take()
            .ok_or_else(|| PlatformError::Join(io::Error::from_raw_os_error(libc::ESRCH)))?;

        // SAFETY: `native` is a joinable thread created by spawn_explicit;
        // taking it out of the handle means Drop will not detach it.
        let code = unsafe { libc::pthread_join(native, ptr::null_mut()) };
        if code != 0 {
            return Err(PlatformError::Join(io::Error::from_raw_os_error(code)));
        }

        self.packet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| PlatformError::Join(io::Error::from_raw_os_error(libc::ESRCH)))
    }
}

impl<T> Drop for RawThread<T> {
    fn drop(&mut self) {
        if let Some(native) = self.native {
            // SAFETY: the thread is joinable and has not been joined.
            unsafe {
                libc::pthread_detach(native);
            }
        }
    }
}

struct Start<F, T> {
    f: F,
    packet: Packet<T>,
}

extern "C" fn trampoline<F, T>(data: *mut c_void) -> *mut c_void
where
    F: FnOnce() -> T,
{
    // SAFETY: `data` is the Box<Start> leaked by spawn_explicit, handed over once.
    let start = unsafe { Box::from_raw(data as *mut Start<F, T>) };
    let Start { f, packet } = *start;
    let result: thread::Result<T> = panic::catch_unwind(AssertUnwindSafe(f));
    *packet.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    ptr::null_mut()
}

/// Spawns `f` on a new OS thread scheduled exactly under `attrs`.
///
/// The new thread does not inherit the caller's policy or priority.
///
/// # Errors
/// - [`PlatformError::InvalidPriority`] if the priority is outside the policy's
///   range; nothing is created.
/// - [`PlatformError::SchedAttr`] if the attribute object rejects a setting.
/// - [`PlatformError::Spawn`] if `pthread_create` fails, typically `EPERM` when
///   requesting a real-time class without `CAP_SYS_NICE` or an RT rlimit.
///   The closure is dropped without running.
pub fn spawn_explicit<F, T>(attrs: SchedAttrs, f: F) -> Result<RawThread<T>, PlatformError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    attrs.policy.validate(attrs.priority)?;

    let mut attr = ThreadAttr::new()?;
    attr.set_explicit_sched(attrs)?;

    let packet: Packet<T> = Arc::new(Mutex::new(None));
    let payload = Box::into_raw(Box::new(Start { f, packet: Arc::clone(&packet) }));
    let mut native = MaybeUninit::<libc::pthread_t>::uninit();

    // SAFETY: `attr` is initialised; ownership of `payload` passes to the
    // trampoline only if creation succeeds.
    let ret = unsafe {
        libc::pthread_create(
            native.as_mut_ptr(),
            &attr.raw,
            trampoline::<F, T>,
            payload as *mut c_void,
        )
    };

    if ret != 0 {
        // SAFETY: the thread was not created, so the payload is still ours.
        drop(unsafe { Box::from_raw(payload) });
        return Err(PlatformError::Spawn(io::Error::from_raw_os_error(ret)));
    }

    debug!("Spawned thread under {} priority {}", attrs.policy, attrs.priority);

    Ok(RawThread {
        // SAFETY: written by the successful pthread_create.
        native: Some(unsafe { native.assume_init() }),
        packet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::sched::SchedPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_spawn_returns_closure_value() {
        let handle = spawn_explicit(SchedAttrs::time_shared(), || 21 * 2).unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn test_spawned_thread_runs_under_requested_attrs() {
        let handle =
            spawn_explicit(SchedAttrs::time_shared(), SchedAttrs::of_current_thread).unwrap();
        let seen = handle.join().unwrap().unwrap().unwrap();
        assert_eq!(seen, SchedAttrs::time_shared());
    }

    #[test]
    fn test_panic_is_returned_not_propagated() {
        let handle =
            spawn_explicit(SchedAttrs::time_shared(), || -> u32 { panic!("workload blew up") })
                .unwrap();
        assert!(handle.join().unwrap().is_err());
    }

    #[test]
    fn test_detached_thread_frees_its_result() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let counter = drops.clone();
        let handle = spawn_explicit(SchedAttrs::time_shared(), move || {
            std::thread::sleep(Duration::from_millis(10));
            Tracked(counter)
        })
        .unwrap();
        drop(handle);

        let deadline = Instant::now() + Duration::from_secs(5);
        while drops.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_priority_never_spawns() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran.clone();
        let result = spawn_explicit(SchedAttrs::new(SchedPolicy::Fifo, 120), move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        assert!(matches!(result, Err(PlatformError::InvalidPriority { .. })));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_fifo_spawn_runs_or_reports_permission() {
        let fifo = SchedAttrs::new(SchedPolicy::Fifo, 80);
        match spawn_explicit(fifo, SchedAttrs::of_current_thread) {
            Ok(handle) => {
                let seen = handle.join().unwrap().unwrap().unwrap();
                assert_eq!(seen, SchedAttrs::new(SchedPolicy::Fifo, 80));
            }
            Err(err) => assert!(err.is_permission_denied(), "unexpected failure: {}", err),
        }
    }
}
