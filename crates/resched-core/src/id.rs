use slotmap::new_key_type;

new_key_type! {
    /// Identifies a module in the registry. Stable across refreshes and
    /// reordering; never a list position.
    pub struct ModuleId;
}

/// A pending module ID returned from a queued registration. Resolves to a
/// [`ModuleId`] on the next registry refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingModuleId(pub u64);
