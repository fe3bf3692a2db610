//! Type index: an immutable snapshot of the types declared by one module.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::core::errors::{Error, Result};

use super::closure::{self, ClosureSettings, SearchLocationSet};
use super::loader::{LoadError, Loader, TypeKey};
use super::module::type_attributes as attrs;
use super::query::{ScanOptions, TypeName, TypeQuery};

/// Assembly anchoring `System.Object` and the other fundamental types.
pub const DEFAULT_CORE_LIBRARY: &str = "System.Private.CoreLib";

/// Name of the pseudo-type holding module-level members.
const MODULE_TYPE: &str = "<Module>";

/// Structural facts about one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    /// Simple name with arity suffix (`Handler`1`)
    pub name: String,
    /// `Ns.Name`, or `Ns.Outer+Inner` for nested types
    pub full_name: String,
    pub namespace: String,
    pub generic_arity: usize,
    pub is_abstract: bool,
    pub is_interface: bool,
    pub is_value_type: bool,
    pub is_public: bool,
    pub is_nested_public: bool,
    pub is_nested: bool,
    /// Flattened interface set
    pub interfaces: Vec<TypeName>,
    /// Base chain, direct base first
    pub base_types: Vec<TypeName>,
}

/// How to open a module for scanning.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub closure: ClosureSettings,
    /// Simple name of the core library
    pub core_library: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            closure: ClosureSettings::default(),
            core_library: DEFAULT_CORE_LIBRARY.to_string(),
        }
    }
}

impl ScanSettings {
    /// Closure settings from the environment, default core library.
    pub fn detect() -> Self {
        ScanSettings {
            closure: ClosureSettings::detect(),
            ..Self::default()
        }
    }

    pub fn with_core_library(mut self, name: impl Into<String>) -> Self {
        self.core_library = name.into();
        self
    }
}

/// Declared types of a compiled module, open for structural queries.
///
/// Nothing is mutated after [`TypeIndex::open`] returns, so shared
/// references may be queried from several threads at once.
#[derive(Debug)]
pub struct TypeIndex {
    artifact: PathBuf,
    types: Vec<TypeDescriptor>,
}

impl TypeIndex {
    /// Collect search locations for `artifact` and enumerate its types.
    pub fn open(artifact: &Path, settings: &ScanSettings) -> Result<Self> {
        let search = closure::collect(artifact, &settings.closure);
        Self::open_with(artifact, &search, &settings.core_library)
    }

    /// Enumerate the types of `artifact` against explicit search locations.
    pub fn open_with(
        artifact: &Path,
        search: &SearchLocationSet,
        core_library: &str,
    ) -> Result<Self> {
        Error::require_non_blank(&artifact.to_string_lossy(), "artifact path")?;

        let mut loader = Loader::new(search);
        let target = loader
            .open(artifact)
            .map_err(|e| Error::scan(artifact, "cannot read module", e))?;
        loader.load_assembly(core_library).map_err(|e| {
            Error::scan(
                artifact,
                format!("core library `{}` could not be resolved", core_library),
                e,
            )
        })?;

        let mut types = Vec::new();
        for def in 0..loader.module(target).len() {
            let key = TypeKey {
                module: target,
                def,
            };
            match describe(&mut loader, key) {
                Ok(Some(ty)) => types.push(ty),
                Ok(None) => {}
                Err(e) => debug!("dropping type {}: {}", loader.full_name(key), e),
            }
        }
        debug!("indexed {} types from {}", types.len(), artifact.display());

        Ok(TypeIndex {
            artifact: artifact.to_path_buf(),
            types,
        })
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Every enumerated type, in declaration order.
    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn find_all_implementing<I, S>(
        &self,
        names: I,
        options: ScanOptions,
    ) -> Result<Vec<&TypeDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = TypeQuery::implementing(names)?.with_options(options);
        Ok(query.find_all(&self.types))
    }

    pub fn find_all_deriving<I, S>(
        &self,
        names: I,
        options: ScanOptions,
    ) -> Result<Vec<&TypeDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = TypeQuery::deriving(names)?.with_options(options);
        Ok(query.find_all(&self.types))
    }

    /// The first type named `target` that implements one of `names`.
    pub fn find_one_implementing<I, S>(
        &self,
        target: &str,
        names: I,
        options: ScanOptions,
        target_full_name: bool,
    ) -> Result<Option<&TypeDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = TypeQuery::implementing(names)?
            .with_options(options)
            .named(target, target_full_name)?;
        Ok(query.find_first(&self.types))
    }

    /// The first type named `target` that derives from one of `names`.
    pub fn find_one_deriving<I, S>(
        &self,
        target: &str,
        names: I,
        options: ScanOptions,
        target_full_name: bool,
    ) -> Result<Option<&TypeDescriptor>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = TypeQuery::deriving(names)?
            .with_options(options)
            .named(target, target_full_name)?;
        Ok(query.find_first(&self.types))
    }

    /// Release the index. Consuming `self` ends every borrow of its types.
    pub fn close(self) {
        debug!("closing type index for {}", self.artifact.display());
    }
}

/// Descriptor for one definition; `None` for the module pseudo-type.
fn describe(loader: &mut Loader<'_>, key: TypeKey) -> Result<Option<TypeDescriptor>, LoadError> {
    let module = loader.module(key.module);
    let def = module
        .type_def(key.def)
        .cloned()
        .ok_or_else(|| LoadError::Malformed(format!("definition {} is missing", key.def)))?;
    if def.name == MODULE_TYPE && def.namespace.is_empty() {
        return Ok(None);
    }
    let full_name = module.full_name(key.def);
    let is_nested = module.enclosing(key.def).is_some();

    let shape = loader.shape(key)?;
    let base_types: Vec<TypeName> = shape.base_chain.iter().map(|b| loader.render(b)).collect();
    let interfaces: Vec<TypeName> = shape.interfaces.iter().map(|i| loader.render(i)).collect();

    let is_interface = def.flags & attrs::INTERFACE != 0;
    let is_value_type = !is_interface
        && match base_types.first().map(|b| b.full_name.as_str()) {
            Some("System.ValueType") => full_name != "System.Enum",
            Some("System.Enum") => true,
            _ => false,
        };
    let visibility = def.flags & attrs::VISIBILITY_MASK;

    let top = full_name.split('+').next().unwrap_or(&full_name);
    let namespace = top.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("").to_string();
    let generic_arity = def
        .name
        .rsplit_once('`')
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0);

    Ok(Some(TypeDescriptor {
        name: def.name,
        namespace,
        generic_arity,
        is_abstract: def.flags & attrs::ABSTRACT != 0,
        is_interface,
        is_value_type,
        is_public: visibility == attrs::PUBLIC,
        is_nested_public: visibility == attrs::NESTED_PUBLIC,
        is_nested,
        interfaces,
        base_types,
        full_name,
    }))
}
