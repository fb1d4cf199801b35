use std::fmt;
use std::task::Poll;
use derive_more::*;
use smallvec::SmallVec;
use crate::{AssetKind, AssetManager, AsyncSource, BackingKind, DirectSource, BundleHandles, OperationId, ReferenceMisuseError, ResolutionError, ResourceHandle, Sources};

/// Invoked once a request finishes loading, with the resource if it loaded successfully.
pub type LoadCallback = Box<dyn FnOnce(&mut AssetManager, &str, Option<ResourceHandle>)>;

/**
 * Where an [`AssetRequest`] is in its load/unload cycle.
 */
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl LoadState {
    /// Loaded or failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed)
    }
}

/**
 * Why a request ended up [`LoadState::Failed`].
 */
#[derive(Clone, Eq, PartialEq, Debug, Display)]
pub enum LoadFailure {
    #[display(fmt="{}", _0)]
    Unresolved(ResolutionError),
    #[display(fmt="Backing store produced no resource")]
    Backing,
    #[display(fmt="No source configured for this kind of asset")]
    MissingSource,
}

enum Operation {
    Idle,
    Immediate(Option<ResourceHandle>),
    Pending(OperationId),
}

/**
 * Load/unload cycle of a single logical asset path.
 * Created and driven by the [`AssetManager`]; callers observe it through its id.
 */
pub struct AssetRequest {
    path: String,
    kind: AssetKind,
    backing: Result<BackingKind, ResolutionError>,  // Decided once, when the request is created.
    state: LoadState,
    operation: Operation,
    resource: Option<ResourceHandle>,
    failure: Option<LoadFailure>,
    ref_count: u32,
    callbacks: SmallVec<[LoadCallback; 2]>,
    awaiting_completion: bool,                      // Loading, or settled but not yet completed by a tick.
}

impl AssetRequest {

    pub(crate) fn new(path: impl Into<String>, kind: AssetKind, backing: Result<BackingKind, ResolutionError>) -> Self {
        Self {
            path: path.into(),
            kind,
            backing,
            state: LoadState::Unloaded,
            operation: Operation::Idle,
            resource: None,
            failure: None,
            ref_count: 0,
            callbacks: SmallVec::new(),
            awaiting_completion: false,
        }
    }

    pub fn path(&self) -> &str { &self.path }

    pub fn kind(&self) -> AssetKind { self.kind }

    pub fn state(&self) -> LoadState { self.state }

    /// Resource, present only while loaded.
    pub fn resource(&self) -> Option<&ResourceHandle> { self.resource.as_ref() }

    pub fn failure(&self) -> Option<&LoadFailure> { self.failure.as_ref() }

    pub fn ref_count(&self) -> u32 { self.ref_count }

    /// Backing store the path resolved to. None if it didn't resolve.
    pub fn backing(&self) -> Option<&BackingKind> { self.backing.as_ref().ok() }

    pub fn is_resolved(&self) -> bool { self.backing.is_ok() }

    pub fn is_terminal(&self) -> bool { self.state.is_terminal() }

    /**
     * Starts loading from the backing store.
     * Archive-backed requests keep their bundle open until [`finish`](Self::finish).
     * Returns false if the request was not unloaded.
     */
    pub(crate) fn begin_load(&mut self, sources: &mut Sources, bundles: &mut BundleHandles) -> bool {
        if self.state != LoadState::Unloaded {
            log::warn!("Attempted to load '{}' while {:?}", self.path, self.state);
            return false
        }
        self.operation = match &self.backing {
            Err(err) => {
                self.failure = Some(LoadFailure::Unresolved(err.clone()));
                Operation::Immediate(None)
            },
            Ok(BackingKind::Direct) => match sources.direct.as_mut() {
                Some(direct) => Operation::Immediate(direct.fetch(&self.path, &self.kind)),
                None => {
                    self.failure = Some(LoadFailure::MissingSource);
                    Operation::Immediate(None)
                },
            },
            Ok(BackingKind::Archive(entry)) => match sources.archive.as_mut() {
                Some(archive) => {
                    bundles.open(&entry.bundle);
                    Operation::Pending(archive.issue(entry, &self.kind))
                },
                None => {
                    self.failure = Some(LoadFailure::MissingSource);
                    Operation::Immediate(None)
                },
            },
            Ok(BackingKind::Loose(key)) => match sources.loose.as_mut() {
                Some(loose) => Operation::Pending(loose.issue(key, &self.kind)),
                None => {
                    self.failure = Some(LoadFailure::MissingSource);
                    Operation::Immediate(None)
                },
            },
        };
        self.state = LoadState::Loading;
        self.awaiting_completion = true;
        log::trace!("Began loading '{}'", self.path);
        true
    }

    /**
     * Checks on the backing operation without blocking.
     * True while the request is still queued or loading, false once it loaded or failed.
     */
    pub fn poll_ready(&mut self, sources: &mut Sources) -> bool {
        if self.state != LoadState::Loading {
            return self.state == LoadState::Unloaded
        }
        let outcome = match &mut self.operation {
            Operation::Immediate(resource) => Poll::Ready(resource.take()),
            Operation::Pending(operation) => poll_source(&self.backing, sources, *operation),
            Operation::Idle => Poll::Ready(None),
        };
        match outcome {
            Poll::Pending => true,
            Poll::Ready(resource) => {
                self.settle(resource);
                false
            },
        }
    }

    fn settle(&mut self, resource: Option<ResourceHandle>) {
        self.operation = Operation::Idle;
        match resource {
            Some(resource) => {
                self.resource = Some(resource);
                self.state = LoadState::Loaded;
            },
            None => {
                self.failure.get_or_insert(LoadFailure::Backing);
                self.state = LoadState::Failed;
            },
        }
    }

    /**
     * Releases the backing resource and returns to [`LoadState::Unloaded`].
     * Closes the request's bundle if it was the last asset using it.
     * Returns false if the request had not finished loading.
     */
    pub(crate) fn finish(&mut self, sources: &mut Sources, bundles: &mut BundleHandles) -> bool {
        if !self.state.is_terminal() {
            log::error!("Attempted to finish '{}' while {:?}", self.path, self.state);
            return false
        }
        let resource = self.resource.take();
        match &self.backing {
            Ok(BackingKind::Direct) => {
                if let (Some(direct), Some(resource)) = (sources.direct.as_mut(), resource.as_ref()) {
                    direct.release(&self.path, resource);
                }
            },
            Ok(BackingKind::Archive(entry)) => {
                if let Some(archive) = sources.archive.as_mut() {
                    archive.release(entry, resource.as_ref());
                    if bundles.close(&entry.bundle) {
                        log::debug!("Closing bundle '{}'", entry.bundle);
                        archive.close_bundle(&entry.bundle);
                    }
                }
            },
            Ok(BackingKind::Loose(key)) => {
                if let Some(loose) = sources.loose.as_mut() {
                    loose.release(key, resource.as_ref());
                }
            },
            Err(_) => {},
        }
        self.state = LoadState::Unloaded;
        true
    }

    /// Adds a reference, and returns the new count.
    pub(crate) fn retain(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    /// Removes a reference. True if no references remain.
    pub(crate) fn release(&mut self) -> Result<bool, ReferenceMisuseError> {
        if self.ref_count == 0 {
            return Err(ReferenceMisuseError::Underflow { path: self.path.clone() });
        }
        self.ref_count -= 1;
        Ok(self.ref_count == 0)
    }

    pub(crate) fn attach(&mut self, callback: LoadCallback) {
        self.callbacks.push(callback);
    }

    pub(crate) fn take_callbacks(&mut self) -> SmallVec<[LoadCallback; 2]> {
        std::mem::take(&mut self.callbacks)
    }

    /**
     * True from [`begin_load`](Self::begin_load) until the manager has indexed the resource and fired callbacks.
     * A request can be terminal while this is still set, if it was polled outside of a tick.
     */
    pub fn is_awaiting_completion(&self) -> bool { self.awaiting_completion }

    pub(crate) fn mark_completed(&mut self) {
        self.awaiting_completion = false;
    }

    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }
}

fn poll_source(backing: &Result<BackingKind, ResolutionError>, sources: &mut Sources, operation: OperationId) -> Poll<Option<ResourceHandle>> {
    fn poll<S: AsyncSource + ?Sized>(source: &mut S, operation: OperationId) -> Poll<Option<ResourceHandle>> {
        if source.poll_done(operation) {
            Poll::Ready(source.take_result(operation))
        } else {
            Poll::Pending
        }
    }
    let polled = match backing {
        Ok(BackingKind::Archive(_)) => sources.archive.as_mut().map(|archive| poll(&mut **archive, operation)),
        Ok(BackingKind::Loose(_)) => sources.loose.as_mut().map(|loose| poll(&mut **loose, operation)),
        _ => None,
    };
    polled.unwrap_or(Poll::Ready(None))
}

impl fmt::Debug for AssetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRequest")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("backing", &self.backing)
            .field("state", &self.state)
            .field("resource", &self.resource)
            .field("failure", &self.failure)
            .field("ref_count", &self.ref_count)
            .field("callbacks", &self.callbacks.len())
            .field("awaiting_completion", &self.awaiting_completion)
            .finish()
    }
}


#[cfg(test)]
mod test {
    use crate::{ArchiveEntry, AssetKind, BackingKind, BundleHandles, LoadFailure, LoadState, MemoryStore, ReferenceMisuseError, ResolutionError, SourceCall, Sources};
    use super::AssetRequest;

    fn sources(store: &MemoryStore) -> Sources {
        Sources {
            direct: Some(Box::new(store.direct())),
            archive: Some(Box::new(store.archive())),
            loose: Some(Box::new(store.loose())),
        }
    }

    fn archived(entry: &str) -> AssetRequest {
        let backing = Ok(BackingKind::Archive(ArchiveEntry::new("b", entry)));
        AssetRequest::new(format!("/b/{entry}"), AssetKind::of::<u32>(), backing)
    }

    #[test]
    fn direct_is_ready_after_one_poll() {
        let store = MemoryStore::new();
        let stored = store.insert_direct("/x.tex", 3u32);
        let mut sources = sources(&store);
        let mut bundles = BundleHandles::default();
        let mut request = AssetRequest::new("/x.tex", AssetKind::of::<u32>(), Ok(BackingKind::Direct));

        assert!(request.poll_ready(&mut sources));
        assert_eq!(LoadState::Unloaded, request.state());
        assert!(request.begin_load(&mut sources, &mut bundles));
        assert_eq!(LoadState::Loading, request.state());
        assert!(request.is_awaiting_completion());
        assert!(!request.poll_ready(&mut sources));
        assert_eq!(LoadState::Loaded, request.state());
        assert!(request.is_awaiting_completion());
        request.mark_completed();
        assert!(!request.is_awaiting_completion());
        assert!(request.resource().unwrap().ptr_eq(&stored));
        assert!(!request.poll_ready(&mut sources));

        assert!(request.finish(&mut sources, &mut bundles));
        assert_eq!(LoadState::Unloaded, request.state());
        assert!(request.resource().is_none());
        assert_eq!(vec![SourceCall::Fetch("/x.tex".into()), SourceCall::Release("/x.tex".into())], store.calls());
    }

    #[test]
    fn archive_holds_bundle_open() {
        let store = MemoryStore::new();
        store.set_latency(1);
        store.insert_archive("b", "x.tex", 1u32);
        store.insert_archive("b", "y.tex", 2u32);
        let mut sources = sources(&store);
        let mut bundles = BundleHandles::default();
        let mut x = archived("x.tex");
        let mut y = archived("y.tex");

        x.begin_load(&mut sources, &mut bundles);
        y.begin_load(&mut sources, &mut bundles);
        assert_eq!(2, bundles.count("b"));
        assert!(x.poll_ready(&mut sources));
        assert!(!x.poll_ready(&mut sources));
        assert!(y.poll_ready(&mut sources));
        assert!(!y.poll_ready(&mut sources));

        x.finish(&mut sources, &mut bundles);
        assert_eq!(1, bundles.count("b"));
        assert_eq!(0, store.count(&SourceCall::CloseBundle("b".into())));
        y.finish(&mut sources, &mut bundles);
        assert_eq!(0, bundles.count("b"));
        assert_eq!(1, store.count(&SourceCall::CloseBundle("b".into())));
    }

    #[test]
    fn missing_entry_fails() {
        let store = MemoryStore::new();
        let mut sources = sources(&store);
        let mut bundles = BundleHandles::default();
        let mut request = archived("missing.tex");
        request.begin_load(&mut sources, &mut bundles);
        assert!(!request.poll_ready(&mut sources));
        assert_eq!(LoadState::Failed, request.state());
        assert_eq!(Some(&LoadFailure::Backing), request.failure());

        // Failed loads still release what they issued.
        request.finish(&mut sources, &mut bundles);
        assert_eq!(1, store.count(&SourceCall::Release("b:missing.tex".into())));
        assert_eq!(1, store.count(&SourceCall::CloseBundle("b".into())));
    }

    #[test]
    fn unresolved_fails_without_backing_calls() {
        let store = MemoryStore::new();
        let mut sources = sources(&store);
        let mut bundles = BundleHandles::default();
        let err = ResolutionError { path: "/nope.tex".into() };
        let mut request = AssetRequest::new("/nope.tex", AssetKind::of::<u32>(), Err(err.clone()));
        assert!(!request.is_resolved());
        request.begin_load(&mut sources, &mut bundles);
        assert!(!request.poll_ready(&mut sources));
        assert_eq!(LoadState::Failed, request.state());
        assert_eq!(Some(&LoadFailure::Unresolved(err)), request.failure());
        request.finish(&mut sources, &mut bundles);
        assert!(store.calls().is_empty());
    }

    #[test]
    fn missing_source_fails() {
        let mut sources = Sources::new();
        let mut bundles = BundleHandles::default();
        let mut request = AssetRequest::new("notes.txt", AssetKind::of::<String>(), Ok(BackingKind::Loose("notes.txt".into())));
        request.begin_load(&mut sources, &mut bundles);
        assert!(!request.poll_ready(&mut sources));
        assert_eq!(Some(&LoadFailure::MissingSource), request.failure());
    }

    #[test]
    fn begin_and_finish_guard_state() {
        let store = MemoryStore::new();
        store.set_stalled(true);
        store.insert_loose("notes.txt", String::from("notes"));
        let mut sources = sources(&store);
        let mut bundles = BundleHandles::default();
        let mut request = AssetRequest::new("notes.txt", AssetKind::of::<String>(), Ok(BackingKind::Loose("notes.txt".into())));
        assert!(!request.finish(&mut sources, &mut bundles));
        assert!(request.begin_load(&mut sources, &mut bundles));
        assert!(!request.begin_load(&mut sources, &mut bundles));
        assert!(request.poll_ready(&mut sources));
        assert!(!request.finish(&mut sources, &mut bundles));
        assert_eq!(1, store.loads_started());
    }

    #[test]
    fn release_reports_zero_and_underflow() {
        let mut request = archived("x.tex");
        assert_eq!(1, request.retain());
        assert_eq!(2, request.retain());
        assert_eq!(Ok(false), request.release());
        assert_eq!(Ok(true), request.release());
        assert_eq!(Err(ReferenceMisuseError::Underflow { path: "/b/x.tex".into() }), request.release());
        assert_eq!(0, request.ref_count());
    }
}
