use std::collections::hash_map::Entry;
use std::collections::VecDeque;
use derive_more::*;
use slotmap::{new_key_type, SlotMap};
use tracing::instrument;
use crate::{ArchiveSource, AssetConfig, AssetKind, AssetRequest, BundleHandles, DirectSource, HashMap, LoadCallback, LoadState, LooseSource, Manifest, ManifestError, PathResolver, ResourceHandle, ResourceId, Sources};

new_key_type! {
    /**
     * ID of an [`AssetRequest`] owned by an [`AssetManager`].
     * Goes stale once the request is fully unloaded; reloading the path yields a new ID.
     */
    pub struct RequestId;
}

/**
 * Loads assets through pluggable backing stores, sharing each one between every requester of its path.
 * Nothing happens in the background: the owner calls [`advance`](Self::advance) once per tick,
 * which admits queued loads, finishes completed ones and unloads assets nobody references anymore.
 */
pub struct AssetManager {
    resolver: PathResolver,                                 // Decides which store serves a path.
    sources: Sources,                                       // Stores that perform the actual loading.
    bundles: BundleHandles,                                 // Assets in use per open bundle.
    max_loads_per_tick: usize,
    requests: SlotMap<RequestId, AssetRequest>,
    path_to_request: HashMap<String, RequestId>,            // Live and draining requests.
    resource_to_request: HashMap<ResourceId, RequestId>,    // Loaded resources, for unloading by resource.
    pending: VecDeque<RequestId>,                           // Waiting for admission, oldest first.
    loading: Vec<RequestId>,                                // Admitted and polled every tick.
    draining: Vec<RequestId>,                               // No references left, waiting to be unloaded.
}

impl AssetManager {

    pub fn builder() -> AssetManagerBuilder {
        AssetManagerBuilder::default()
    }

    /**
     * Loads the asset at `path` as `kind`, and returns the ID of its request.
     * If the path is already requested, no second load is started: the existing request gains a reference
     * and `on_complete` is queued behind earlier callbacks, or invoked immediately if loading already finished.
     * Each call must eventually be balanced by an [`unload`](Self::unload).
     */
    pub fn load_async<F>(&mut self, path: &str, kind: AssetKind, on_complete: F) -> RequestId
    where
        F: FnOnce(&mut AssetManager, &str, Option<ResourceHandle>) + 'static,
    {
        self.load_with(path, kind, Some(Box::new(on_complete)))
    }

    /// Same as [`load_async`](Self::load_async), without a completion callback.
    pub fn load(&mut self, path: &str, kind: AssetKind) -> RequestId {
        self.load_with(path, kind, None)
    }

    fn load_with(&mut self, path: &str, kind: AssetKind, on_complete: Option<LoadCallback>) -> RequestId {
        let id = match self.path_to_request.get(path) {
            Some(&id) => {
                self.revive(id);
                id
            },
            None => self.create(path, kind),
        };
        let request = &mut self.requests[id];
        if request.kind() != kind {
            log::debug!("'{path}' requested as {kind}, but is loading as {}", request.kind());
        }
        request.retain();
        if let Some(on_complete) = on_complete {
            request.attach(on_complete);
        }
        // Settled but not yet completed by a tick: complete() indexes the resource, then fires callbacks.
        if request.is_terminal() && !request.is_awaiting_completion() {
            let resource = request.resource().cloned();
            let callbacks = request.take_callbacks();
            for callback in callbacks {
                callback(self, path, resource.clone());
            }
        }
        id
    }

    fn create(&mut self, path: &str, kind: AssetKind) -> RequestId {
        let backing = self.resolver.resolve(path);
        if let Err(err) = &backing {
            log::warn!("{err}");
        }
        let id = self.requests.insert(AssetRequest::new(path, kind, backing));
        self.path_to_request.insert(path.into(), id);

        // Unresolved requests skip admission, and fail on their first poll.
        let request = &mut self.requests[id];
        if request.is_resolved() {
            self.pending.push_back(id);
        } else {
            request.begin_load(&mut self.sources, &mut self.bundles);
            self.loading.push(id);
        }
        log::trace!("Created request for '{path}'");
        id
    }

    /// Takes a request back out of the draining set.
    fn revive(&mut self, id: RequestId) {
        if let Some(index) = self.draining.iter().position(|draining| *draining == id) {
            self.draining.remove(index);
            log::debug!("Revived '{}' before it was unloaded", self.requests[id].path());
        }
    }

    /**
     * Removes a reference to the asset at `path`.
     * Once none remain, the asset is unloaded by a later [`advance`](Self::advance).
     */
    pub fn unload(&mut self, path: &str) -> Result<(), ReferenceMisuseError> {
        let Some(&id) = self.path_to_request.get(path) else {
            let err = ReferenceMisuseError::Untracked { path: path.into() };
            log::error!("{err}");
            return Err(err);
        };
        self.release_request(id)
    }

    /**
     * Removes a reference to the asset that produced `resource`.
     * Does nothing if the resource is not tracked, as it may already have been unloaded.
     */
    pub fn unload_resource(&mut self, resource: &ResourceHandle) -> Result<(), ReferenceMisuseError> {
        let Some(&id) = self.resource_to_request.get(&resource.id()) else {
            log::debug!("Unloading untracked resource {:?}", resource.id());
            return Ok(());
        };
        self.release_request(id)
    }

    /// Adds a reference to a request, and returns the new count.
    pub fn retain(&mut self, id: RequestId) -> Result<u32, ReferenceMisuseError> {
        if !self.requests.contains_key(id) {
            log::error!("{}", ReferenceMisuseError::StaleRequest);
            return Err(ReferenceMisuseError::StaleRequest);
        }
        self.revive(id);
        Ok(self.requests[id].retain())
    }

    /// Removes a reference from a request. Same as unloading its path.
    pub fn release(&mut self, id: RequestId) -> Result<(), ReferenceMisuseError> {
        self.release_request(id)
    }

    fn release_request(&mut self, id: RequestId) -> Result<(), ReferenceMisuseError> {
        let Some(request) = self.requests.get_mut(id) else {
            log::error!("{}", ReferenceMisuseError::StaleRequest);
            return Err(ReferenceMisuseError::StaleRequest);
        };
        match request.release() {
            Ok(true) => {
                log::debug!("'{}' has no more references", request.path());
                self.draining.push(id);
                Ok(())
            },
            Ok(false) => Ok(()),
            Err(err) => {
                log::error!("{err}");
                Err(err)
            },
        }
    }

    /**
     * Drops every outstanding reference.
     * Everything is unloaded over the following ticks, until [`is_idle`](Self::is_idle).
     */
    pub fn unload_all(&mut self) {
        for (id, request) in self.requests.iter_mut() {
            if request.ref_count() > 0 {
                while request.release() == Ok(false) {}
                self.draining.push(id);
            }
        }
    }

    /**
     * Polls a request without blocking.
     * True while it is still queued or loading, false once it loaded, failed, or no longer exists.
     */
    pub fn poll_ready(&mut self, id: RequestId) -> bool {
        match self.requests.get_mut(id) {
            Some(request) => request.poll_ready(&mut self.sources),
            None => false,
        }
    }

    /**
     * Runs one tick of maintenance:
     * admits up to `max_loads_per_tick` queued requests, finishes requests whose loads completed
     * (invoking their callbacks), then unloads requests that have no references and have stopped loading.
     */
    #[instrument(skip_all)]
    pub fn advance(&mut self) -> TickStats {
        let admitted = self.admit();
        let completed = self.complete();
        let drained = self.drain();
        TickStats { admitted, completed, drained }
    }

    #[instrument(skip_all)]
    fn admit(&mut self) -> usize {
        let mut admitted = 0;
        while admitted < self.max_loads_per_tick {
            let Some(id) = self.pending.pop_front() else { break };
            let Some(request) = self.requests.get_mut(id) else { continue };
            if request.begin_load(&mut self.sources, &mut self.bundles) {
                self.loading.push(id);
                admitted += 1;
            }
        }
        admitted
    }

    #[instrument(skip_all)]
    fn complete(&mut self) -> usize {
        let mut completions = Vec::new();
        let Self { requests, sources, loading, resource_to_request, .. } = self;
        loading.retain(|&id| {
            let Some(request) = requests.get_mut(id) else { return false };
            if request.poll_ready(sources) {
                return true
            }
            if let Some(resource) = request.resource() {
                match resource_to_request.entry(resource.id()) {
                    Entry::Vacant(entry) => {
                        entry.insert(id);
                    },
                    Entry::Occupied(_) => log::warn!("Resource of '{}' is already owned by another path", request.path()),
                }
            }
            match request.state() {
                LoadState::Loaded => log::debug!("Loaded '{}'", request.path()),
                _ => log::warn!("Failed to load '{}'", request.path()),
            }
            request.mark_completed();
            completions.push((request.path().to_owned(), request.resource().cloned(), request.take_callbacks()));
            false
        });

        // Index is complete before any callback runs, so callbacks may unload by resource.
        let completed = completions.len();
        for (path, resource, callbacks) in completions {
            for callback in callbacks {
                callback(self, &path, resource.clone());
            }
        }
        completed
    }

    #[instrument(skip_all)]
    fn drain(&mut self) -> usize {
        let draining = std::mem::take(&mut self.draining);
        // Requests settled by poll_ready() outside of a tick wait for complete() to fire their callbacks.
        let (finished, waiting): (Vec<RequestId>, Vec<RequestId>) = draining
            .into_iter()
            .partition(|&id| match self.requests.get(id) {
                Some(request) => request.is_terminal() && !request.is_awaiting_completion(),
                None => true,
            });
        self.draining = waiting;
        let mut drained = 0;
        for id in finished {
            let Some(mut request) = self.requests.remove(id) else { continue };
            if let Some(resource) = request.resource() {
                if self.resource_to_request.get(&resource.id()) == Some(&id) {
                    self.resource_to_request.remove(&resource.id());
                }
            }
            request.finish(&mut self.sources, &mut self.bundles);
            if self.path_to_request.get(request.path()) == Some(&id) {
                self.path_to_request.remove(request.path());
            }
            log::debug!("Unloaded '{}'", request.path());
            drained += 1;
        }
        drained
    }

    /// Replaces the path table. Existing requests keep the store they resolved to.
    pub fn reload_manifest(&mut self, manifest: &Manifest) -> Result<(), ManifestError> {
        self.resolver.rebuild(manifest)
    }

    pub fn request(&self, id: RequestId) -> Option<&AssetRequest> {
        self.requests.get(id)
    }

    /// Request of a live or draining path.
    pub fn request_for(&self, path: &str) -> Option<&AssetRequest> {
        let id = *self.path_to_request.get(path)?;
        self.requests.get(id)
    }

    pub fn id_of(&self, path: &str) -> Option<RequestId> {
        self.path_to_request.get(path).copied()
    }

    pub fn state(&self, path: &str) -> Option<LoadState> {
        self.request_for(path).map(AssetRequest::state)
    }

    pub fn resource(&self, path: &str) -> Option<&ResourceHandle> {
        self.request_for(path)?.resource()
    }

    /// References held on `path`. Zero if it's draining or not requested.
    pub fn ref_count(&self, path: &str) -> u32 {
        self.request_for(path).map_or(0, AssetRequest::ref_count)
    }

    /// Path that produced `resource`, if it's still tracked.
    pub fn path_of(&self, resource: &ResourceHandle) -> Option<&str> {
        let id = *self.resource_to_request.get(&resource.id())?;
        self.requests.get(id).map(AssetRequest::path)
    }

    /// Assets loading or loaded out of `bundle`.
    pub fn bundle_handles(&self, bundle: &str) -> u32 {
        self.bundles.count(bundle)
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn max_loads_per_tick(&self) -> usize {
        self.max_loads_per_tick
    }

    /// Changes the admission throttle. Clamped to at least one.
    pub fn set_max_loads_per_tick(&mut self, max_loads_per_tick: usize) {
        self.max_loads_per_tick = max_loads_per_tick.max(1);
    }

    /// Number of live and draining requests.
    pub fn len(&self) -> usize { self.requests.len() }

    pub fn is_empty(&self) -> bool { self.requests.is_empty() }

    pub fn pending_len(&self) -> usize { self.pending.len() }

    pub fn loading_len(&self) -> usize { self.loading.len() }

    pub fn draining_len(&self) -> usize { self.draining.len() }

    /// True once every request has been unloaded.
    pub fn is_idle(&self) -> bool {
        self.requests.is_empty()
    }
}

/**
 * Counts of what happened during one [`AssetManager::advance`].
 */
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct TickStats {
    pub admitted: usize,
    pub completed: usize,
    pub drained: usize,
}

/**
 * Explicitly configures and constructs an [`AssetManager`].
 */
#[derive(Default)]
pub struct AssetManagerBuilder {
    config: AssetConfig,
    manifest: Manifest,
    sources: Sources,
}

impl AssetManagerBuilder {

    pub fn config(mut self, config: AssetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_loads_per_tick(mut self, max_loads_per_tick: usize) -> Self {
        self.config.max_loads_per_tick = max_loads_per_tick;
        self
    }

    pub fn loose_root(mut self, loose_root: impl Into<String>) -> Self {
        self.config.loose_root = Some(loose_root.into());
        self
    }

    pub fn simulate_bundles(mut self, simulate_bundles: bool) -> Self {
        self.config.simulate_bundles = simulate_bundles;
        self
    }

    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn direct(mut self, source: impl DirectSource + 'static) -> Self {
        self.sources.direct = Some(Box::new(source));
        self
    }

    pub fn archive(mut self, source: impl ArchiveSource + 'static) -> Self {
        self.sources.archive = Some(Box::new(source));
        self
    }

    pub fn loose(mut self, source: impl LooseSource + 'static) -> Self {
        self.sources.loose = Some(Box::new(source));
        self
    }

    pub fn build(self) -> Result<AssetManager, BuildError> {
        if self.config.max_loads_per_tick == 0 {
            return Err(BuildError::ZeroLoadsPerTick);
        }
        let resolver = PathResolver::new(&self.manifest, self.config.resolve_options())?;
        Ok(AssetManager {
            resolver,
            sources: self.sources,
            bundles: BundleHandles::default(),
            max_loads_per_tick: self.config.max_loads_per_tick,
            requests: SlotMap::with_key(),
            path_to_request: HashMap::default(),
            resource_to_request: HashMap::default(),
            pending: VecDeque::new(),
            loading: Vec::new(),
            draining: Vec::new(),
        })
    }
}

#[derive(Error, Debug, Display, Clone, Eq, PartialEq)]
pub enum ReferenceMisuseError {
    #[display(fmt="Released '{}', which is not loaded", path)]
    Untracked { path: String },
    #[display(fmt="Released '{}' more times than it was retained", path)]
    Underflow { path: String },
    #[display(fmt="Request no longer exists")]
    StaleRequest,
}

#[derive(Error, Debug, Display, From)]
pub enum BuildError {
    #[display(fmt="max_loads_per_tick must be at least 1")]
    #[from(ignore)]
    ZeroLoadsPerTick,
    Manifest(ManifestError),
}
