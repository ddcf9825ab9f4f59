#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::{
        Condvar, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    };
    // Ownership is not part of the modeled concurrency.
    pub(crate) use std::sync::{Arc, Weak};
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use std::sync::{
        Arc, Condvar, Mutex, RwLock, Weak,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    };
}

pub(crate) use imp::*;
