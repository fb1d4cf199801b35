use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/**
 * Shareable resource like an image, animation, sound etc.
 */
pub trait Asset: Any + Send + Sync + 'static {}
impl<A: Send + Sync + 'static> Asset for A {}

/**
 * Type an asset is requested as.
 * Backing sources use it to reject resources of the wrong type.
 */
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct AssetKind {
    type_id: TypeId,
    name: &'static str,
}

impl AssetKind {

    pub fn of<A: Asset>() -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            name: type_name::<A>(),
        }
    }

    pub fn type_id(&self) -> TypeId { self.type_id }

    pub fn name(&self) -> &'static str { self.name }

    /// True if the resource holds a value of this kind.
    pub fn matches(&self, resource: &ResourceHandle) -> bool {
        resource.type_id() == self.type_id
    }
}

impl fmt::Debug for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetKind({})", self.name)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/**
 * Opaque, shared handle to a loaded resource.
 * Cloning is cheap and only bumps the shared count of the underlying allocation.
 */
#[derive(Clone)]
pub struct ResourceHandle(Arc<dyn Any + Send + Sync>);

impl ResourceHandle {

    pub fn new<A: Asset>(asset: A) -> Self {
        Self(Arc::new(asset))
    }

    pub fn from_boxed(asset: Box<dyn Any + Send + Sync>) -> Self {
        Self(Arc::from(asset))
    }

    /// Identity of the underlying allocation.
    pub fn id(&self) -> ResourceId {
        ResourceId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// [`TypeId`] of the stored value.
    pub fn type_id(&self) -> TypeId {
        let any: &dyn Any = &*self.0;
        any.type_id()
    }

    pub fn downcast_ref<A: Asset>(&self) -> Option<&A> {
        self.0.downcast_ref()
    }

    pub fn is<A: Asset>(&self) -> bool {
        self.0.is::<A>()
    }

    /// True if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceHandle").field(&self.id()).finish()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ResourceHandle {}

/**
 * Identity of a [`ResourceHandle`]'s allocation.
 * Only meaningful while some handle to the allocation is alive.
 */
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ResourceId(usize);
