//! Runtime-agnostic async primitives.
//!
//! Per the [Rust Async Book](https://rust-lang.github.io/async-book/08_ecosystem/00_chapter.html):
//! > "Libraries exposing async APIs should not depend on a specific executor
//! > or reactor, unless they need to spawn tasks or define their own async
//! > I/O or timer futures."
//!
//! `linkmesh-conn` only needs mutual exclusion and event notification, both
//! satisfied by `async-lock`/`event-listener` without committing to Tokio.
//! The in-memory reference transport in [`crate::memory`] is the one place
//! that needs an executor to spawn pump tasks, and it depends on Tokio
//! directly for that rather than going through this module.

/// A runtime-agnostic async mutex.
pub use async_lock::Mutex as AsyncMutex;

/// A runtime-agnostic async `RwLock`.
pub use async_lock::RwLock as AsyncRwLock;

/// A runtime-agnostic semaphore.
pub use async_lock::Semaphore as AsyncSemaphore;

/// A runtime-agnostic semaphore guard.
pub use async_lock::SemaphoreGuard as AsyncSemaphoreGuard;

/// A runtime-agnostic event notification mechanism, used to wake callers
/// blocked on `ConnectionManager::resolve` coalescing.
pub use event_listener::Event as Notify;
