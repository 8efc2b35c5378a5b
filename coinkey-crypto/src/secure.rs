//! Pinned, self-erasing storage for secret bytes.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
#[cfg(unix)]
use std::collections::BTreeMap;
#[cfg(unix)]
use std::sync::{Mutex, MutexGuard, OnceLock};

use zeroize::Zeroize;

static MEMORY_LOCK_ENABLED: AtomicBool = AtomicBool::new(true);
static LOCK_FAILURE_REPORTED: Once = Once::new();

/// Enable or disable page pinning for buffers created from now on.
pub fn set_memory_lock_enabled(enabled: bool) {
    MEMORY_LOCK_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Whether new buffers try to pin their pages.
pub fn memory_lock_enabled() -> bool {
    MEMORY_LOCK_ENABLED.load(Ordering::SeqCst)
}

/// A fixed-size secret buffer.
///
/// The bytes live in their own heap allocation so the address stays stable
/// for the lifetime of the value. On construction the pages are pinned with
/// `mlock` where the platform supports it; on drop the bytes are zeroized and
/// the pages released. A clone pins its own allocation.
///
/// Pinning is best effort: a failed lock is reported once at debug level and
/// the buffer is still usable.
pub struct LockedBytes<const N: usize> {
    bytes: Box<[u8; N]>,
    locked: bool,
}

impl<const N: usize> LockedBytes<N> {
    /// Allocate a zeroed buffer.
    pub fn new() -> Self {
        let bytes = Box::new([0u8; N]);
        let locked = memory_lock_enabled() && lock_region(bytes.as_ptr(), N);
        Self { bytes, locked }
    }

    /// Allocate a buffer holding a copy of `src`.
    pub fn from_array(src: &[u8; N]) -> Self {
        let mut out = Self::new();
        out.bytes.copy_from_slice(src);
        out
    }

    /// Whether the pages backing this buffer are pinned.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl<const N: usize> Default for LockedBytes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Clone for LockedBytes<N> {
    fn clone(&self) -> Self {
        Self::from_array(&self.bytes)
    }
}

impl<const N: usize> Deref for LockedBytes<N> {
    type Target = [u8; N];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl<const N: usize> DerefMut for LockedBytes<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

impl<const N: usize> Drop for LockedBytes<N> {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            unlock_region(self.bytes.as_ptr(), N);
        }
    }
}

impl<const N: usize> fmt::Debug for LockedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockedBytes<{}>([REDACTED])", N)
    }
}

/// Pin counts per page base address.
///
/// `mlock` works on whole pages and small buffers share pages, so a page is
/// only locked by its first buffer and only unlocked when its last one goes.
#[cfg(unix)]
static LOCKED_PAGES: Mutex<BTreeMap<usize, usize>> = Mutex::new(BTreeMap::new());

#[cfg(unix)]
fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no memory-safety preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    })
}

/// Base addresses of every page touched by `[ptr, ptr + len)`.
#[cfg(unix)]
fn pages_of(ptr: *const u8, len: usize) -> impl Iterator<Item = usize> {
    let size = page_size();
    let start = ptr as usize & !(size - 1);
    let end = (ptr as usize + len.max(1) - 1) & !(size - 1);
    (start..=end).step_by(size)
}

#[cfg(unix)]
fn locked_pages() -> MutexGuard<'static, BTreeMap<usize, usize>> {
    LOCKED_PAGES.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(unix)]
fn lock_region(ptr: *const u8, len: usize) -> bool {
    let mut pages = locked_pages();
    let mut taken = Vec::new();
    for page in pages_of(ptr, len) {
        if !pages.contains_key(&page) {
            // SAFETY: `page` is the base of a page backing a live allocation
            // owned by the caller; mlock does not read or write through it.
            let rc = unsafe { libc::mlock(page as *const libc::c_void, page_size()) };
            if rc != 0 {
                release_pages(&mut pages, taken);
                report_lock_failure();
                return false;
            }
        }
        *pages.entry(page).or_insert(0) += 1;
        taken.push(page);
    }
    true
}

#[cfg(unix)]
fn unlock_region(ptr: *const u8, len: usize) {
    let mut pages = locked_pages();
    release_pages(&mut pages, pages_of(ptr, len));
}

#[cfg(unix)]
fn release_pages(pages: &mut BTreeMap<usize, usize>, released: impl IntoIterator<Item = usize>) {
    for page in released {
        let Some(count) = pages.get_mut(&page) else {
            continue;
        };
        *count -= 1;
        if *count > 0 {
            continue;
        }
        pages.remove(&page);
        // SAFETY: same page that was passed to mlock, still backing a live
        // allocation.
        let rc = unsafe { libc::munlock(page as *const libc::c_void, page_size()) };
        if rc != 0 {
            log::debug!("munlock failed for page {:#x}", page);
        }
    }
}

/// Number of live buffers pinning the page that holds `ptr`.
#[cfg(all(test, unix))]
fn page_lock_count(ptr: *const u8) -> usize {
    let page = ptr as usize & !(page_size() - 1);
    locked_pages().get(&page).copied().unwrap_or(0)
}

#[cfg(not(unix))]
fn lock_region(_ptr: *const u8, _len: usize) -> bool {
    report_lock_failure();
    false
}

#[cfg(not(unix))]
fn unlock_region(_ptr: *const u8, _len: usize) {}

fn report_lock_failure() {
    LOCK_FAILURE_REPORTED.call_once(|| {
        log::debug!("Memory locking unavailable; secret buffers will not be pinned");
    });
}
