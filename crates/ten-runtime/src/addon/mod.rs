//! Addon registry (spec §3 "Addon host", §4.6).
//!
//! A named, dynamically-registered factory for extensions, extension
//! groups, and addon loaders. Grounded on the teacher's
//! `streamlib-core::registry::ProcessorRegistry` (name-keyed factory map
//! behind a mutex, duplicate registration rejected, snapshot-style reads)
//! generalized to the three addon kinds this spec's `AddonKind` needs
//! instead of one flat processor namespace.

use crate::error::{Result, TenError};
use crate::extension::{DefaultExtensionGroupHandler, Extension, ExtensionGroupHandler};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The built-in group addon materialized for extensions whose graph
/// declaration names no explicit group (spec §4.6).
pub const DEFAULT_EXTENSION_GROUP: &str = "default_extension_group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddonKind {
    Extension,
    ExtensionGroup,
    AddonLoader,
}

pub trait ExtensionFactory: Send + Sync {
    fn create(&self, instance_name: &str, property: &Value) -> Box<dyn Extension>;
}

pub trait ExtensionGroupFactory: Send + Sync {
    fn create(&self, instance_name: &str) -> Box<dyn ExtensionGroupHandler>;
}

/// Addon-package loaders are out of scope for the core (spec §1: "addon
/// package format on disk" is an external collaborator); this trait exists
/// only so loaders occupy a real `AddonKind` namespace slot, matching the
/// spec's three-kind addon model.
pub trait AddonLoaderFactory: Send + Sync {
    fn name(&self) -> &str;
}

struct DefaultExtensionGroupFactory;

impl ExtensionGroupFactory for DefaultExtensionGroupFactory {
    fn create(&self, _instance_name: &str) -> Box<dyn ExtensionGroupHandler> {
        Box::new(DefaultExtensionGroupHandler)
    }
}

/// Registered factories, keyed by name, one map per kind (spec invariant:
/// "names are unique per kind"). Readers take an `Arc` clone of a factory
/// rather than holding the registry lock while an addon constructs an
/// instance, mirroring the teacher's registry snapshot-on-read pattern.
#[derive(Default)]
struct Inner {
    extensions: HashMap<String, Arc<dyn ExtensionFactory>>,
    groups: HashMap<String, Arc<dyn ExtensionGroupFactory>>,
    loaders: HashMap<String, Arc<dyn AddonLoaderFactory>>,
}

pub struct AddonRegistry {
    inner: RwLock<Inner>,
}

impl AddonRegistry {
    /// A registry pre-seeded with the built-in `default_extension_group`
    /// (spec §4.2 step 4; §4.6).
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner
            .groups
            .insert(DEFAULT_EXTENSION_GROUP.to_string(), Arc::new(DefaultExtensionGroupFactory));
        AddonRegistry { inner: RwLock::new(inner) }
    }

    pub fn register_extension(&self, name: impl Into<String>, factory: Arc<dyn ExtensionFactory>) -> Result<()> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.extensions.contains_key(&name) {
            return Err(TenError::InvalidArgument(format!("extension addon '{name}' already registered")));
        }
        inner.extensions.insert(name, factory);
        Ok(())
    }

    pub fn register_extension_group(&self, name: impl Into<String>, factory: Arc<dyn ExtensionGroupFactory>) -> Result<()> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.groups.contains_key(&name) {
            return Err(TenError::InvalidArgument(format!("extension-group addon '{name}' already registered")));
        }
        inner.groups.insert(name, factory);
        Ok(())
    }

    pub fn register_addon_loader(&self, name: impl Into<String>, factory: Arc<dyn AddonLoaderFactory>) -> Result<()> {
        let name = name.into();
        let mut inner = self.inner.write();
        if inner.loaders.contains_key(&name) {
            return Err(TenError::InvalidArgument(format!("addon loader '{name}' already registered")));
        }
        inner.loaders.insert(name, factory);
        Ok(())
    }

    /// Looks up and instantiates an extension addon. The `AddonNotFound`
    /// error carries the addon name so the engine can build the diagnostic
    /// spec §8 scenario 6 requires ("Unable to find does_not_exist").
    pub fn create_extension(&self, addon_name: &str, instance_name: &str, property: &Value) -> Result<Box<dyn Extension>> {
        let factory = self.inner.read().extensions.get(addon_name).cloned();
        let factory = factory.ok_or_else(|| TenError::AddonNotFound(addon_name.to_string()))?;
        Ok(factory.create(instance_name, property))
    }

    pub fn create_extension_group(&self, addon_name: &str, instance_name: &str) -> Result<Box<dyn ExtensionGroupHandler>> {
        let factory = self.inner.read().groups.get(addon_name).cloned();
        let factory = factory.ok_or_else(|| TenError::AddonNotFound(addon_name.to_string()))?;
        Ok(factory.create(instance_name))
    }

    pub fn has(&self, kind: AddonKind, name: &str) -> bool {
        let inner = self.inner.read();
        match kind {
            AddonKind::Extension => inner.extensions.contains_key(name),
            AddonKind::ExtensionGroup => inner.groups.contains_key(name),
            AddonKind::AddonLoader => inner.loaders.contains_key(name),
        }
    }
}

impl Default for AddonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Extension;

    struct EchoExtension;
    impl Extension for EchoExtension {}

    struct EchoFactory;
    impl ExtensionFactory for EchoFactory {
        fn create(&self, _instance_name: &str, _property: &Value) -> Box<dyn Extension> {
            Box::new(EchoExtension)
        }
    }

    #[test]
    fn default_extension_group_is_preregistered() {
        let registry = AddonRegistry::new();
        assert!(registry.has(AddonKind::ExtensionGroup, DEFAULT_EXTENSION_GROUP));
        assert!(registry.create_extension_group(DEFAULT_EXTENSION_GROUP, "g1").is_ok());
    }

    #[test]
    fn duplicate_registration_in_same_kind_rejected() {
        let registry = AddonRegistry::new();
        registry.register_extension("echo", Arc::new(EchoFactory)).unwrap();
        assert!(registry.register_extension("echo", Arc::new(EchoFactory)).is_err());
    }

    #[test]
    fn missing_addon_reports_addon_not_found_with_name() {
        let registry = AddonRegistry::new();
        let err = registry.create_extension("does_not_exist", "i1", &Value::Map(Default::default())).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::AddonNotFound);
        assert!(err.to_string().contains("does_not_exist"));
    }
}
