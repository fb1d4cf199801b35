use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use crate::{ArchiveEntry, ArchiveSource, Asset, AssetKind, AsyncSource, DirectSource, HashMap, OperationId, ResourceHandle};

/**
 * Call made to one of a [`MemoryStore`]'s sources.
 * Archive entries are rendered as "bundle:entry".
 */
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SourceCall {
    Fetch(String),
    Issue(String),
    Release(String),
    CloseBundle(String),
}

/**
 * In-memory backing store serving all three kinds of source from shared state.
 * Used by tooling and tests. Every call is recorded and can be inspected after
 * the sources have been handed to an [`AssetManager`](crate::AssetManager).
 */
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    direct: HashMap<String, ResourceHandle>,
    archive: HashMap<ArchiveEntry, ResourceHandle>,
    loose: HashMap<String, ResourceHandle>,
    latency: u32,                                       // Polls an operation reports unfinished for.
    stalled: bool,                                      // Keeps every operation unfinished.
    next_operation: u64,
    operations: HashMap<OperationId, PendingOperation>,
    calls: Vec<SourceCall>,
}

struct PendingOperation {
    remaining_polls: u32,
    result: Option<ResourceHandle>,
}

impl MemoryStore {

    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RefMut<'_, MemoryState> {
        self.state.borrow_mut()
    }

    /// Stores a resource served in-process at `path`, and returns its handle.
    pub fn insert_direct(&self, path: impl Into<String>, asset: impl Asset) -> ResourceHandle {
        let resource = ResourceHandle::new(asset);
        self.state().direct.insert(path.into(), resource.clone());
        resource
    }

    /// Stores a resource as `entry` of `bundle`, and returns its handle.
    pub fn insert_archive(&self, bundle: impl Into<String>, entry: impl Into<String>, asset: impl Asset) -> ResourceHandle {
        let resource = ResourceHandle::new(asset);
        self.state().archive.insert(ArchiveEntry::new(bundle, entry), resource.clone());
        resource
    }

    /// Stores a resource under a loose-file `key`, and returns its handle.
    pub fn insert_loose(&self, key: impl Into<String>, asset: impl Asset) -> ResourceHandle {
        let resource = ResourceHandle::new(asset);
        self.state().loose.insert(key.into(), resource.clone());
        resource
    }

    /// Number of polls each newly issued operation stays unfinished for.
    pub fn set_latency(&self, polls: u32) {
        self.state().latency = polls;
    }

    /// While stalled, no operation finishes.
    pub fn set_stalled(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &SourceCall) -> usize {
        self.state.borrow().calls.iter().filter(|recorded| *recorded == call).count()
    }

    /// Number of calls that started loading something, of any source kind.
    pub fn loads_started(&self) -> usize {
        self.state.borrow().calls
            .iter()
            .filter(|call| matches!(call, SourceCall::Fetch(_) | SourceCall::Issue(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Operations issued but not yet taken.
    pub fn open_operations(&self) -> usize {
        self.state.borrow().operations.len()
    }

    pub fn direct(&self) -> MemoryDirect {
        MemoryDirect(self.clone())
    }

    pub fn archive(&self) -> MemoryArchive {
        MemoryArchive(self.clone())
    }

    pub fn loose(&self) -> MemoryLoose {
        MemoryLoose(self.clone())
    }
}

impl MemoryState {

    fn issue(&mut self, call: String, found: Option<ResourceHandle>, kind: &AssetKind) -> OperationId {
        let result = found.filter(|resource| {
            let matches = kind.matches(resource);
            if !matches {
                log::warn!("'{call}' is not of kind {kind}");
            }
            matches
        });
        let operation = OperationId(self.next_operation);
        self.next_operation += 1;
        self.operations.insert(operation, PendingOperation {
            remaining_polls: self.latency,
            result,
        });
        self.calls.push(SourceCall::Issue(call));
        operation
    }

    fn poll_done(&mut self, operation: OperationId) -> bool {
        if self.stalled {
            return false
        }
        let Some(pending) = self.operations.get_mut(&operation) else {
            return true
        };
        if pending.remaining_polls == 0 {
            return true
        }
        pending.remaining_polls -= 1;
        false
    }

    fn take_result(&mut self, operation: OperationId) -> Option<ResourceHandle> {
        self.operations.remove(&operation)?.result
    }
}

/// [`DirectSource`] view of a [`MemoryStore`].
pub struct MemoryDirect(MemoryStore);

impl DirectSource for MemoryDirect {

    fn fetch(&mut self, path: &str, kind: &AssetKind) -> Option<ResourceHandle> {
        let mut state = self.0.state();
        state.calls.push(SourceCall::Fetch(path.into()));
        state.direct
            .get(path)
            .filter(|resource| kind.matches(resource))
            .cloned()
    }

    fn release(&mut self, path: &str, _resource: &ResourceHandle) {
        self.0.state().calls.push(SourceCall::Release(path.into()));
    }
}

/// [`ArchiveSource`] view of a [`MemoryStore`].
pub struct MemoryArchive(MemoryStore);

impl AsyncSource for MemoryArchive {

    type Key = ArchiveEntry;

    fn issue(&mut self, key: &ArchiveEntry, kind: &AssetKind) -> OperationId {
        let mut state = self.0.state();
        let found = state.archive.get(key).cloned();
        state.issue(key.to_string(), found, kind)
    }

    fn poll_done(&mut self, operation: OperationId) -> bool {
        self.0.state().poll_done(operation)
    }

    fn take_result(&mut self, operation: OperationId) -> Option<ResourceHandle> {
        self.0.state().take_result(operation)
    }

    fn release(&mut self, key: &ArchiveEntry, _resource: Option<&ResourceHandle>) {
        self.0.state().calls.push(SourceCall::Release(key.to_string()));
    }
}

impl ArchiveSource for MemoryArchive {
    fn close_bundle(&mut self, bundle: &str) {
        self.0.state().calls.push(SourceCall::CloseBundle(bundle.into()));
    }
}

/// Loose-file view of a [`MemoryStore`].
pub struct MemoryLoose(MemoryStore);

impl AsyncSource for MemoryLoose {

    type Key = str;

    fn issue(&mut self, key: &str, kind: &AssetKind) -> OperationId {
        let mut state = self.0.state();
        let found = state.loose.get(key).cloned();
        state.issue(key.into(), found, kind)
    }

    fn poll_done(&mut self, operation: OperationId) -> bool {
        self.0.state().poll_done(operation)
    }

    fn take_result(&mut self, operation: OperationId) -> Option<ResourceHandle> {
        self.0.state().take_result(operation)
    }

    fn release(&mut self, key: &str, _resource: Option<&ResourceHandle>) {
        self.0.state().calls.push(SourceCall::Release(key.into()));
    }
}
