use std::any::{Any, TypeId};
use crate::{Asset, AssetPath};

/// Takes the contents of a file, and converts them into an asset.
pub trait AssetLoader: Send + Sync + 'static {
    type AssetType: Asset;
    fn load(&self, path: &AssetPath, bytes: &[u8]) -> anyhow::Result<Self::AssetType>;
    fn extensions(&self) -> &[&str];
}

/// Dynamic trait variant of [`AssetLoader`].
pub(crate) trait DynLoader: Send + Sync + 'static {
    fn dyn_load(&self, path: &AssetPath, bytes: &[u8]) -> anyhow::Result<Box<dyn Any + Send + Sync + 'static>>;
    fn asset_type(&self) -> TypeId;
    fn extensions(&self) -> &[&str];
}

impl<L: AssetLoader> DynLoader for L {

    fn dyn_load(&self, path: &AssetPath, bytes: &[u8]) -> anyhow::Result<Box<dyn Any + Send + Sync + 'static>> {
        let asset = self.load(path, bytes)?;
        Ok(Box::new(asset))
    }

    fn asset_type(&self) -> TypeId {
        TypeId::of::<L::AssetType>()
    }

    fn extensions(&self) -> &[&str] {
        AssetLoader::extensions(self)
    }
}

/**
 * Loads files as UTF-8 [`String`]s.
 */
#[derive(Clone, Debug)]
pub struct TextLoader {
    extensions: Vec<&'static str>,
}

impl TextLoader {
    pub fn new(extensions: impl IntoIterator<Item = &'static str>) -> Self {
        Self { extensions: extensions.into_iter().collect() }
    }
}

impl AssetLoader for TextLoader {
    type AssetType = String;

    fn load(&self, _path: &AssetPath, bytes: &[u8]) -> anyhow::Result<String> {
        let text = std::str::from_utf8(bytes)?;
        Ok(text.to_owned())
    }

    fn extensions(&self) -> &[&str] {
        &self.extensions
    }
}

/**
 * Loads files as raw bytes.
 */
#[derive(Clone, Debug)]
pub struct BytesLoader {
    extensions: Vec<&'static str>,
}

impl BytesLoader {
    pub fn new(extensions: impl IntoIterator<Item = &'static str>) -> Self {
        Self { extensions: extensions.into_iter().collect() }
    }
}

impl AssetLoader for BytesLoader {
    type AssetType = Vec<u8>;

    fn load(&self, _path: &AssetPath, bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn extensions(&self) -> &[&str] {
        &self.extensions
    }
}
