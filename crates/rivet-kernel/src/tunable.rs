//! [`TunableRegistry`] – process-wide store of runtime-adjustable scalars.
//!
//! Every gain and feedforward coefficient on the robot lives here under a
//! hierarchical key.  The first access to a key registers its default from
//! the active mode's [`ModeTable`]; later [`set`][TunableRegistry::set] calls
//! override it for the rest of the process lifetime.
//!
//! # Read/write timing
//!
//! Writes are *staged*.  They become visible only when the control loop
//! calls [`begin_tick`][TunableRegistry::begin_tick] at the top of the next
//! tick, so every read of a key within one tick returns the same value no
//! matter when a dashboard writes it.
//!
//! # Example
//!
//! ```rust
//! use rivet_kernel::defaults::ParameterTable;
//! use rivet_kernel::tunable::TunableRegistry;
//! use rivet_types::ExecutionMode;
//!
//! let registry = TunableRegistry::new(ParameterTable::builtin().resolve(ExecutionMode::Simulated));
//! assert_eq!(registry.get("Shooter/Flywheel/kV"), 0.002);
//!
//! registry.set("Shooter/Flywheel/kV", 0.0021);
//! assert_eq!(registry.get("Shooter/Flywheel/kV"), 0.002); // staged
//! registry.begin_tick();
//! assert_eq!(registry.get("Shooter/Flywheel/kV"), 0.0021);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use rivet_types::ExecutionMode;
use tracing::{debug, warn};

use crate::defaults::ModeTable;

static GLOBAL: OnceLock<Arc<TunableRegistry>> = OnceLock::new();

#[derive(Debug, Clone, Copy)]
struct Entry {
    live: f64,
    staged: Option<f64>,
    default: f64,
}

/// Keyed store of tunable parameters.  Cheap to share behind an [`Arc`].
#[derive(Debug)]
pub struct TunableRegistry {
    defaults: ModeTable,
    entries: RwLock<HashMap<String, Entry>>,
    generation: AtomicU64,
}

impl TunableRegistry {
    pub fn new(defaults: ModeTable) -> Self {
        Self {
            defaults,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The execution mode whose defaults this registry was built from.
    pub fn mode(&self) -> ExecutionMode {
        self.defaults.mode()
    }

    /// Live value of `key`, registering its default on first access.
    pub fn get(&self, key: &str) -> f64 {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get(key) {
                return entry.live;
            }
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.register(&mut entries, key).live
    }

    /// Stage `value` for `key`; it takes effect at the next tick boundary.
    pub fn set(&self, key: &str, value: f64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = self.register(&mut entries, key);
        entry.staged = Some(value);
    }

    /// Stage a return to the mode default for `key`.
    pub fn reset(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = self.register(&mut entries, key);
        entry.staged = Some(entry.default);
    }

    /// Commit every staged write.  Returns how many live values changed.
    ///
    /// Called once by the control loop before any mechanism reads a gain.
    pub fn begin_tick(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut changed = 0;
        for (key, entry) in entries.iter_mut() {
            if let Some(value) = entry.staged.take() {
                if value != entry.live {
                    debug!(key = %key, old = entry.live, new = value, "tunable committed");
                    entry.live = value;
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        changed
    }

    /// Increments whenever [`begin_tick`][Self::begin_tick] commits a change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Live values of every registered key, sorted.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().map(|(k, e)| (k.clone(), e.live)).collect()
    }

    /// A handle bound to `key`.
    pub fn number(self: &Arc<Self>, key: impl Into<String>) -> TunableNumber {
        let number = TunableNumber {
            key: key.into(),
            registry: Arc::clone(self),
        };
        number.get();
        number
    }

    fn register<'a>(&self, entries: &'a mut HashMap<String, Entry>, key: &str) -> &'a mut Entry {
        entries.entry(key.to_string()).or_insert_with(|| {
            let default = self.defaults.get(key).unwrap_or_else(|| {
                warn!(key, mode = %self.defaults.mode(), "no default for tunable; using 0.0");
                0.0
            });
            Entry {
                live: default,
                staged: None,
                default,
            }
        })
    }
}

/// Install `registry` as the process-wide instance.
///
/// Returns the rejected registry if one is already installed.
pub fn install_global(registry: Arc<TunableRegistry>) -> Result<(), Arc<TunableRegistry>> {
    GLOBAL.set(registry)
}

/// The process-wide registry, if one has been installed.
pub fn global() -> Option<Arc<TunableRegistry>> {
    GLOBAL.get().cloned()
}

/// A tunable parameter bound to its registry.
#[derive(Debug, Clone)]
pub struct TunableNumber {
    key: String,
    registry: Arc<TunableRegistry>,
}

impl TunableNumber {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> f64 {
        self.registry.get(&self.key)
    }
}
