use std::any::Any;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use derive_more::*;
use crate::{AssetKind, AssetLoader, AssetPath, AsyncSource, DynLoader, HashMap, OperationId, ResourceHandle};

/**
 * Loose-file store that reads files relative to a root directory.
 * Each file is read and decoded on a background thread by the [`AssetLoader`]
 * registered for its extension. Results are collected when polled.
 */
pub struct FileSource {
    root: PathBuf,
    loaders: Vec<Arc<dyn DynLoader>>,
    extension_to_loader: HashMap<String, usize>,
    next_operation: u64,
    finished: HashMap<OperationId, Option<ResourceHandle>>,
    sender: Sender<FileMessage>,
    receiver: Receiver<FileMessage>,
}

enum FileMessage {
    Finished {
        operation: OperationId,
        asset: Box<dyn Any + Send + Sync>,
    },
    Failed(OperationId),
}

impl FileSource {

    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        Self {
            root: root.into(),
            loaders: Vec::new(),
            extension_to_loader: HashMap::default(),
            next_operation: 0,
            finished: HashMap::default(),
            sender,
            receiver,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Adds a loader for transforming file bytes into assets.
    pub fn with_loader(mut self, loader: impl AssetLoader) -> Result<Self, FileSourceError> {
        self.add_loader(loader)?;
        Ok(self)
    }

    /// Adds a loader for transforming file bytes into assets.
    pub fn add_loader(&mut self, loader: impl AssetLoader) -> Result<(), FileSourceError> {
        let loader: Arc<dyn DynLoader> = Arc::new(loader);
        for extension in loader.extensions() {
            if self.extension_to_loader.contains_key(*extension) {
                return Err(FileSourceError::ExtensionOverlaps { extension: String::from(*extension) });
            }
        }
        let loader_index = self.loaders.len();
        for extension in loader.extensions() {
            self.extension_to_loader.insert(String::from(*extension), loader_index);
        }
        self.loaders.push(loader);
        Ok(())
    }

    fn fail(&mut self, operation: OperationId) -> OperationId {
        self.finished.insert(operation, None);
        operation
    }

    /// Moves results sent by background reads into the finished table.
    fn collect_messages(&mut self) {
        for message in self.receiver.try_iter() {
            match message {
                FileMessage::Finished { operation, asset } => {
                    self.finished.insert(operation, Some(ResourceHandle::from_boxed(asset)));
                },
                FileMessage::Failed(operation) => {
                    self.finished.insert(operation, None);
                },
            }
        }
    }
}

/// Relative location of `key` under a root, rejecting keys that would escape it.
fn relative_path(key: &str) -> Option<&Path> {
    let relative = Path::new(key.trim_start_matches('/'));
    let escapes = relative.components().any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return None
    }
    Some(relative)
}

impl AsyncSource for FileSource {

    type Key = str;

    fn issue(&mut self, key: &str, kind: &AssetKind) -> OperationId {
        let operation = OperationId(self.next_operation);
        self.next_operation += 1;

        let Some(relative) = relative_path(key) else {
            log::error!("Loose file key '{key}' is not a relative path");
            return self.fail(operation);
        };
        let path = AssetPath::parse(key);
        let loader_index = path.extension
            .as_deref()
            .and_then(|extension| self.extension_to_loader.get(extension))
            .copied();
        let loader = match loader_index {
            Some(loader_index) => self.loaders[loader_index].clone(),
            None => {
                log::error!("No loader matching extension of '{key}'");
                return self.fail(operation);
            },
        };
        if loader.asset_type() != kind.type_id() {
            log::error!("Loader for '{key}' does not produce {kind}");
            return self.fail(operation);
        }

        // Reads and decodes file in background thread.
        let file_path = self.root.join(relative);
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            let bytes = match std::fs::read(&file_path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::error!("Failed reading '{}': {err}", file_path.display());
                    let _ = sender.send(FileMessage::Failed(operation));
                    return;
                },
            };
            match loader.dyn_load(&path, &bytes) {
                Ok(asset) => {
                    let _ = sender.send(FileMessage::Finished { operation, asset });
                },
                Err(err) => {
                    log::error!("Failed decoding '{}': {err}", file_path.display());
                    let _ = sender.send(FileMessage::Failed(operation));
                },
            }
        });
        operation
    }

    fn poll_done(&mut self, operation: OperationId) -> bool {
        self.collect_messages();
        self.finished.contains_key(&operation)
    }

    fn take_result(&mut self, operation: OperationId) -> Option<ResourceHandle> {
        self.collect_messages();
        self.finished.remove(&operation).flatten()
    }

    fn release(&mut self, key: &str, _resource: Option<&ResourceHandle>) {
        log::trace!("Released loose file '{key}'");
    }
}

#[derive(Error, Debug, Display, Clone, Eq, PartialEq)]
pub enum FileSourceError {
    #[display(fmt="Extension '{}' is already handled by another loader", extension)]
    ExtensionOverlaps { extension: String },
}
