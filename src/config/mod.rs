//! Process-wide thread configuration
//!
//! Holds the global thread policy shared by every threader instance: the hard
//! maximum thread count, the default thread count seeding new threaders, and the
//! default backend selection. Values are resolved in a fixed order: compiled
//! defaults, then environment overrides, then explicit API calls (which always
//! win).
//!
//! The globals are guarded by a mutex, but the supported usage is
//! single-writer-at-startup: configure everything before constructing threaders
//! that read the defaults. Concurrent writers racing against readers must be
//! serialized by the caller.

use lazy_static::lazy_static;
use std::fmt;
use std::sync::Mutex;

/// Compiled ceiling on the number of worker threads. Several bookkeeping
/// structures are sized against this bound.
pub const HARD_MAX_THREADS: usize = 128;

/// Environment variable naming the default backend ("Platform", "Pool" or
/// "TaskLibrary"; case-sensitive).
pub const BACKEND_ENV: &str = "FANOUT_GLOBAL_DEFAULT_THREADER";

/// Legacy boolean-style environment variable. Can only choose between the Pool
/// and Platform backends; superseded by [`BACKEND_ENV`].
pub const LEGACY_POOL_ENV: &str = "FANOUT_USE_THREADPOOL";

/// Environment variable overriding the default thread count.
pub const THREAD_COUNT_ENV: &str = "FANOUT_NUMBER_OF_THREADS";

/// Backend compiled in as the default when neither the environment nor an
/// explicit call selects one.
pub const COMPILED_DEFAULT_BACKEND: BackendKind = BackendKind::Pool;

/// Currently supported worker-pool backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Spawn fresh OS threads for every call
    Platform,
    /// Reusable worker pool fed through channels
    Pool,
    /// Task-library (rayon) thread pool
    TaskLibrary,
    /// Unrecognized selection; resolves to the compiled default at use sites
    Unknown,
}

impl BackendKind {
    /// Convert a backend name into its enum value. The match is exact and
    /// case-sensitive; anything unrecognized maps to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Platform" => BackendKind::Platform,
            "Pool" => BackendKind::Pool,
            "TaskLibrary" => BackendKind::TaskLibrary,
            _ => BackendKind::Unknown,
        }
    }

    /// The display name for this backend. Round-trips through
    /// [`BackendKind::from_name`] for the three known backends.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Platform => "Platform",
            BackendKind::Pool => "Pool",
            BackendKind::TaskLibrary => "TaskLibrary",
            BackendKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct ThreadGlobals {
    maximum_threads: usize,
    default_threads: usize,
    default_backend: BackendKind,
}

impl ThreadGlobals {
    /// Resolve initial values: compiled defaults overridden by the environment.
    fn bootstrap() -> Self {
        let maximum_threads = HARD_MAX_THREADS;
        let default_threads = thread_count_from_env()
            .unwrap_or_else(num_cpus::get)
            .clamp(1, maximum_threads);
        let default_backend = backend_from_env().unwrap_or(COMPILED_DEFAULT_BACKEND);
        tracing::debug!(
            "thread globals: max={maximum_threads} default={default_threads} backend={default_backend}"
        );
        Self { maximum_threads, default_threads, default_backend }
    }
}

lazy_static! {
    static ref GLOBALS: Mutex<ThreadGlobals> = Mutex::new(ThreadGlobals::bootstrap());
}

fn lock_globals() -> std::sync::MutexGuard<'static, ThreadGlobals> {
    // A writer can only poison this lock by panicking mid-update, and updates
    // are single plain stores; the stored values stay coherent.
    match GLOBALS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn thread_count_from_env() -> Option<usize> {
    let raw = std::env::var(THREAD_COUNT_ENV).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(count) if count >= 1 => Some(count),
        _ => {
            tracing::warn!("ignoring unusable {THREAD_COUNT_ENV}={raw:?}");
            None
        }
    }
}

fn backend_from_env() -> Option<BackendKind> {
    if let Ok(name) = std::env::var(BACKEND_ENV) {
        let kind = BackendKind::from_name(&name);
        if kind == BackendKind::Unknown {
            tracing::warn!(
                "unrecognized backend {name:?} in {BACKEND_ENV}, using {COMPILED_DEFAULT_BACKEND}"
            );
            return Some(COMPILED_DEFAULT_BACKEND);
        }
        return Some(kind);
    }
    if let Ok(flag) = std::env::var(LEGACY_POOL_ENV) {
        let use_pool = !matches!(flag.trim(), "" | "0" | "OFF" | "Off" | "off" | "NO" | "No" | "no" | "FALSE" | "False" | "false");
        return Some(if use_pool { BackendKind::Pool } else { BackendKind::Platform });
    }
    None
}

/// Set the process-wide maximum thread count, clamped to `[1, HARD_MAX_THREADS]`.
/// The default thread count is re-clamped against the new maximum. Callers should
/// read the value back rather than assume the request was honored verbatim.
pub fn set_global_maximum_threads(value: usize) {
    let mut globals = lock_globals();
    globals.maximum_threads = value.clamp(1, HARD_MAX_THREADS);
    globals.default_threads = globals.default_threads.clamp(1, globals.maximum_threads);
}

pub fn global_maximum_threads() -> usize {
    lock_globals().maximum_threads
}

/// Set the thread count seeding newly constructed threaders, clamped to
/// `[1, global maximum]`.
pub fn set_global_default_threads(value: usize) {
    let mut globals = lock_globals();
    globals.default_threads = value.clamp(1, globals.maximum_threads);
}

pub fn global_default_threads() -> usize {
    lock_globals().default_threads
}

/// Explicitly select the default backend. Always wins over the environment.
/// `Unknown` is not a real backend and is ignored with a warning.
pub fn set_global_default_backend(kind: BackendKind) {
    if kind == BackendKind::Unknown {
        tracing::warn!("refusing to set default backend to Unknown");
        return;
    }
    lock_globals().default_backend = kind;
}

pub fn global_default_backend() -> BackendKind {
    lock_globals().default_backend
}
