//! Call-site identity and process-lifetime interning.
//!
//! A call site is the `(line, file, function)` triple of one instrumentation
//! point. Sites are registered once in a global interner and referred to by a
//! dense `CallSiteId` afterwards, so the enter/drop hot path only moves a
//! `u32` around. The `profile!` macro caches the id in a per-site static.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

/// One instrumentation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub line: u32,
    pub file: &'static str,
    pub function: &'static str,
}

/// Interned handle for a `CallSite`. Stable for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(u32);

impl CallSiteId {
    /// Resolve the handle back to its call site.
    pub fn site(self) -> CallSite {
        with_interner(|interner| interner.sites[self.0 as usize])
    }
}

#[derive(Default)]
struct Interner {
    sites: Vec<CallSite>,
    /// Ids bucketed by line number. Buckets are tiny in practice, so a
    /// linear scan over them avoids allocating a key for every lookup.
    by_line: HashMap<u32, Vec<CallSiteId>>,
}

impl Interner {
    fn find(&self, line: u32, file: &str, function: &str) -> Option<CallSiteId> {
        self.by_line.get(&line)?.iter().copied().find(|id| {
            let site = &self.sites[id.0 as usize];
            site.file == file && site.function == function
        })
    }

    fn insert(&mut self, site: CallSite) -> CallSiteId {
        let id = CallSiteId(self.sites.len() as u32);
        self.sites.push(site);
        self.by_line.entry(site.line).or_default().push(id);
        id
    }
}

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn with_interner<R>(f: impl FnOnce(&mut Interner) -> R) -> R {
    let mut interner = INTERNER
        .get_or_init(|| Mutex::new(Interner::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    f(&mut interner)
}

/// Register a call site whose strings already live for the whole process
/// (`file!()`, string literals, `type_name`). Nothing is copied.
///
/// Registering the same triple twice returns the same id.
pub fn register(line: u32, file: &'static str, function: &'static str) -> CallSiteId {
    with_interner(|interner| {
        interner.find(line, file, function).unwrap_or_else(|| {
            interner.insert(CallSite {
                line,
                file,
                function,
            })
        })
    })
}

/// Register a call site from borrowed strings, copying them into the
/// interner the first time the triple is seen.
///
/// Use this for names built at runtime. The copies are never freed.
pub fn intern(line: u32, file: &str, function: &str) -> CallSiteId {
    with_interner(|interner| {
        if let Some(id) = interner.find(line, file, function) {
            return id;
        }
        let file: &'static str = Box::leak(file.to_owned().into_boxed_str());
        let function: &'static str = Box::leak(function.to_owned().into_boxed_str());
        interner.insert(CallSite {
            line,
            file,
            function,
        })
    })
}

/// Strip the marker item name appended by `profile!` from a `type_name`,
/// leaving the path of the enclosing function.
#[doc(hidden)]
pub fn __enclosing_function(marker_path: &'static str) -> &'static str {
    marker_path
        .strip_suffix("::__easyprof_here")
        .unwrap_or(marker_path)
}

#[doc(hidden)]
pub fn __type_name_of<T>(_: T) -> &'static str {
    std::any::type_name::<T>()
}
