//! The host-populated set of modules and its derived orderings.
//!
//! Hosts register modules explicitly; the registry never discovers them on
//! its own. The execution order and per-resource supplier lists are derived
//! views that are rebuilt by [`ModuleRegistry::refresh`] whenever the module
//! set is marked stale.

use crate::id::{ModuleId, PendingModuleId};
use crate::module::Module;
use crate::priority::ResourcePriority;
use crate::resource::ResourceName;
use log::{debug, warn};
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    /// `None` while the module is executing.
    module: Option<Box<dyn Module>>,
    name: String,
    priority: ResourcePriority,
    supplies: Vec<ResourceName>,
    /// Registration order, used to break priority ties.
    seq: u64,
}

impl Entry {
    fn new(module: Box<dyn Module>, seq: u64) -> Self {
        let mut entry = Self {
            name: String::new(),
            priority: ResourcePriority::default(),
            supplies: Vec::new(),
            module: Some(module),
            seq,
        };
        entry.read_capabilities();
        entry
    }

    /// Re-read name, priority and supplied kinds from the module, if present.
    fn read_capabilities(&mut self) {
        if let Some(module) = &self.module {
            self.name = module.name().to_string();
            self.priority = module.priority();
            self.supplies = module
                .as_supplier()
                .map(|s| s.resources_supplied())
                .unwrap_or_default();
        }
    }
}

// ---------------------------------------------------------------------------
// Queued mutations
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Mutation {
    Register {
        module: Box<dyn Module>,
        pending_id: PendingModuleId,
    },
    Remove {
        id: ModuleId,
    },
}

/// Result of a refresh. Maps pending IDs to real IDs.
#[derive(Debug, Default)]
pub struct RefreshResult {
    pub added: Vec<(PendingModuleId, ModuleId)>,
    pub removed: Vec<ModuleId>,
}

impl RefreshResult {
    /// Look up the real `ModuleId` for a pending registration.
    pub fn resolve(&self, pending: PendingModuleId) -> Option<ModuleId> {
        self.added
            .iter()
            .find(|(p, _)| *p == pending)
            .map(|(_, id)| *id)
    }
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// Owns every registered module and the orderings derived from them.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: SlotMap<ModuleId, Entry>,
    next_seq: u64,
    ordered: Vec<ModuleId>,
    suppliers: BTreeMap<ResourceName, Vec<ModuleId>>,
    stale: bool,
    generation: u64,
    mutations: Vec<Mutation>,
    next_pending: u64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Register a module immediately. The derived orderings pick it up at
    /// the next refresh.
    pub fn register(&mut self, module: Box<dyn Module>) -> ModuleId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stale = true;
        self.entries.insert(Entry::new(module, seq))
    }

    /// Queue a module for registration at the next refresh.
    pub fn queue_register(&mut self, module: Box<dyn Module>) -> PendingModuleId {
        let pending_id = PendingModuleId(self.next_pending);
        self.next_pending += 1;
        self.mutations.push(Mutation::Register { module, pending_id });
        pending_id
    }

    /// Queue a module for removal at the next refresh.
    pub fn queue_remove(&mut self, id: ModuleId) {
        self.mutations.push(Mutation::Remove { id });
    }

    /// Remove a module immediately, returning it. Returns `None` if the ID
    /// is unknown or the module is currently executing; in the latter case
    /// the module is dropped when its call returns.
    pub fn remove(&mut self, id: ModuleId) -> Option<Box<dyn Module>> {
        let entry = self.entries.remove(id)?;
        self.stale = true;
        entry.module
    }

    /// Flag the derived orderings as out of date.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Returns true if a refresh is needed.
    pub fn is_stale(&self) -> bool {
        self.stale || !self.mutations.is_empty()
    }

    /// Apply queued mutations and rebuild the execution order and supplier
    /// lists.
    pub fn refresh(&mut self) -> RefreshResult {
        let mut result = RefreshResult::default();
        for mutation in std::mem::take(&mut self.mutations) {
            match mutation {
                Mutation::Register { module, pending_id } => {
                    let id = self.register(module);
                    result.added.push((pending_id, id));
                }
                Mutation::Remove { id } => {
                    if self.entries.remove(id).is_some() {
                        result.removed.push(id);
                    }
                }
            }
        }

        for entry in self.entries.values_mut() {
            entry.read_capabilities();
        }

        let mut ordered: Vec<ModuleId> = self.entries.keys().collect();
        ordered.sort_by_key(|id| {
            let entry = &self.entries[*id];
            (entry.priority.sort_key(), entry.seq)
        });
        self.ordered = ordered;

        self.suppliers.clear();
        for &id in &self.ordered {
            let entry = &self.entries[id];
            for &resource in &entry.supplies {
                if !resource.is_known() {
                    warn!(
                        "module {} supplies an unrecognised resource; ignored",
                        entry.name
                    );
                    continue;
                }
                let list = self.suppliers.entry(resource).or_default();
                if !list.contains(&id) {
                    list.push(id);
                }
            }
        }

        self.stale = false;
        self.generation += 1;
        debug!(
            "module registry refreshed: {} modules, {} supplied resources (generation {})",
            self.ordered.len(),
            self.suppliers.len(),
            self.generation
        );
        result
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Module IDs in execution order as of the last refresh.
    pub fn ordered_modules(&self) -> &[ModuleId] {
        &self.ordered
    }

    /// Suppliers for `resource` in execution order as of the last refresh.
    pub fn suppliers_for(&self, resource: ResourceName) -> &[ModuleId] {
        self.suppliers
            .get(&resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Incremented on every refresh.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.entries.contains_key(id)
    }

    /// Name recorded for the module, available even while it executes.
    pub fn name(&self, id: ModuleId) -> Option<&str> {
        self.entries.get(id).map(|e| e.name.as_str())
    }

    pub fn priority(&self, id: ModuleId) -> Option<ResourcePriority> {
        self.entries.get(id).map(|e| e.priority)
    }

    /// Get a typed reference to a module.
    pub fn get<T: Module>(&self, id: ModuleId) -> Option<&T> {
        self.entries
            .get(id)?
            .module
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Get a typed mutable reference to a module.
    pub fn get_mut<T: Module>(&mut self, id: ModuleId) -> Option<&mut T> {
        self.entries
            .get_mut(id)?
            .module
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    // -----------------------------------------------------------------------
    // Execution hand-off
    // -----------------------------------------------------------------------

    /// Move a module out of its slot for the duration of a call.
    pub(crate) fn take(&mut self, id: ModuleId) -> Option<Box<dyn Module>> {
        self.entries.get_mut(id)?.module.take()
    }

    /// Return a module taken with [`take`](Self::take). A module whose entry
    /// was removed in the meantime is dropped.
    pub(crate) fn restore(&mut self, id: ModuleId, module: Box<dyn Module>) {
        match self.entries.get_mut(id) {
            Some(entry) => entry.module = Some(module),
            None => debug!("module {} was removed while executing; dropped", module.name()),
        }
    }
}
