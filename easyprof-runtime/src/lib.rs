//! In-process call-tree profiler runtime.
//!
//! Put `profile!()` at the top of every function you want measured, make a
//! `Collector` current with `start()`, and read per-call-site call counts,
//! self time, and total time from `Collector::results()` after `stop()`.
//!
//! ```
//! use easyprof_runtime::{profile, start, stop, Collector};
//!
//! fn leaf() {
//!     profile!();
//! }
//!
//! fn parent() {
//!     profile!();
//!     for _ in 0..3 {
//!         leaf();
//!     }
//! }
//!
//! let collector = Collector::new();
//! start(&collector);
//! parent();
//! stop();
//!
//! let results = collector.results();
//! assert_eq!(results.total_calls(), 4);
//! ```
#![deny(unsafe_code)]

mod callsite;
mod clock;
mod collector;
mod results;

pub use callsite::{intern, register, CallSite, CallSiteId};
#[doc(hidden)]
pub use callsite::{__enclosing_function, __type_name_of};
pub use clock::{Clock, Seconds, Stopwatch};
pub use collector::{current, depth, enter, start, stop, Collector, Guard};
pub use results::{CallResult, Results, SortBy};

/// Profile the enclosing function until the end of the current block.
///
/// Must be the first statement of the function body. The call site is the
/// macro's line and file plus the enclosing function's path. With a string
/// literal argument, that name is used instead of the function path, which
/// lets a block inside a function be profiled as a pseudo-function.
#[cfg(not(feature = "disable"))]
#[macro_export]
macro_rules! profile {
    () => {
        let _easyprof_guard = {
            fn __easyprof_here() {}
            static SITE: ::std::sync::OnceLock<$crate::CallSiteId> = ::std::sync::OnceLock::new();
            $crate::enter(*SITE.get_or_init(|| {
                $crate::register(
                    ::std::line!(),
                    ::std::file!(),
                    $crate::__enclosing_function($crate::__type_name_of(__easyprof_here)),
                )
            }))
        };
    };
    ($name:expr) => {
        let _easyprof_guard = $crate::profile_scope!($name);
    };
}

/// Open a named scope and return its `Guard`.
///
/// `name` must be a `&'static str`. The scope closes when the guard drops.
#[cfg(not(feature = "disable"))]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {{
        static SITE: ::std::sync::OnceLock<$crate::CallSiteId> = ::std::sync::OnceLock::new();
        $crate::enter(
            *SITE.get_or_init(|| $crate::register(::std::line!(), ::std::file!(), $name)),
        )
    }};
}

#[cfg(feature = "disable")]
#[macro_export]
macro_rules! profile {
    () => {};
    ($name:expr) => {
        let _ = $name;
    };
}

#[cfg(feature = "disable")]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {{
        let _ = $name;
        $crate::Guard::inert()
    }};
}
