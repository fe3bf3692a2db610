//! Cross-assembly type resolution over metadata-only modules.
//!
//! Modules are read on demand from a [`SearchLocationSet`] by assembly
//! simple name. Resolved type shapes (base chain and flattened interface
//! set) are memoized per definition.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::closure::SearchLocationSet;
use super::module::{qualify, ModuleMetadata, ResolutionScope, TypeRefSig, TypeSig};
use super::query::TypeName;

/// Forwarders and nested references followed before giving up.
const MAX_DEPTH: usize = 32;

/// Why a type or assembly could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("could not find assembly `{0}` in the search locations")]
    AssemblyNotFound(String),

    #[error("failed to read `{}`: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("type `{type_name}` not found in assembly `{assembly}`")]
    TypeNotFound { assembly: String, type_name: String },

    #[error("type `{0}` inherits from itself")]
    Cycle(String),

    #[error("{0}")]
    Malformed(String),
}

/// A type definition: module index plus definition index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub module: usize,
    pub def: usize,
}

/// A type as used in a base or interface position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named { key: TypeKey, args: Vec<TypeExpr> },
    /// Resolved by display name only
    Opaque(String),
    Var(u32),
    MVar(u32),
}

impl TypeExpr {
    fn key(&self) -> Option<TypeKey> {
        match self {
            TypeExpr::Named { key, .. } => Some(*key),
            _ => None,
        }
    }

    fn args(&self) -> &[TypeExpr] {
        match self {
            TypeExpr::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// Replace type parameters with the given arguments.
    fn substitute(&self, args: &[TypeExpr]) -> TypeExpr {
        if args.is_empty() {
            return self.clone();
        }
        match self {
            TypeExpr::Var(i) => args
                .get(*i as usize)
                .cloned()
                .unwrap_or(TypeExpr::Var(*i)),
            TypeExpr::Named { key, args: own } => TypeExpr::Named {
                key: *key,
                args: own.iter().map(|a| a.substitute(args)).collect(),
            },
            other => other.clone(),
        }
    }
}

/// Base chain and flattened interfaces of a definition, in terms of its
/// own type parameters.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    /// Direct base first, then its base, until none remains
    pub base_chain: Vec<TypeExpr>,
    /// Declared, inherited, and interface-inherited interfaces, deduplicated
    pub interfaces: Vec<TypeExpr>,
}

pub struct Loader<'a> {
    search: &'a SearchLocationSet,
    modules: Vec<ModuleMetadata>,
    by_name: HashMap<String, usize>,
    failed: HashMap<String, LoadError>,
    refs: HashMap<(usize, TypeRefSig), TypeKey>,
    shapes: HashMap<TypeKey, Shape>,
    in_progress: HashSet<TypeKey>,
}

impl<'a> Loader<'a> {
    pub fn new(search: &'a SearchLocationSet) -> Self {
        Loader {
            search,
            modules: Vec::new(),
            by_name: HashMap::new(),
            failed: HashMap::new(),
            refs: HashMap::new(),
            shapes: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Read the module at `path` and register it under its assembly name.
    pub fn open(&mut self, path: &Path) -> Result<usize, LoadError> {
        let module = ModuleMetadata::load(path).map_err(|e| LoadError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let index = self.modules.len();
        self.by_name
            .entry(module.assembly_name().to_lowercase())
            .or_insert(index);
        self.modules.push(module);
        Ok(index)
    }

    /// Load an assembly by simple name from the search locations.
    pub fn load_assembly(&mut self, name: &str) -> Result<usize, LoadError> {
        let key = name.to_lowercase();
        if let Some(index) = self.by_name.get(&key) {
            return Ok(*index);
        }
        if let Some(err) = self.failed.get(&key) {
            return Err(err.clone());
        }

        let search = self.search;
        let result = match search.find_assembly(name) {
            Some(path) => self.open(path),
            None => Err(LoadError::AssemblyNotFound(name.to_string())),
        };
        match result {
            Ok(index) => {
                self.by_name.insert(key, index);
                tracing::trace!("loaded assembly {}", name);
                Ok(index)
            }
            Err(err) => {
                self.failed.insert(key, err.clone());
                Err(err)
            }
        }
    }

    pub fn module(&self, index: usize) -> &ModuleMetadata {
        &self.modules[index]
    }

    /// Full name of a definition.
    pub fn full_name(&self, key: TypeKey) -> String {
        self.modules[key.module].full_name(key.def)
    }

    /// Find a type by full name in an assembly, following forwarders.
    fn find_type(
        &mut self,
        module: usize,
        full_name: &str,
        depth: usize,
    ) -> Result<TypeKey, LoadError> {
        if let Some(def) = self.modules[module].find_type(full_name) {
            return Ok(TypeKey { module, def });
        }
        if depth >= MAX_DEPTH {
            return Err(self.not_found(module, full_name));
        }

        // Forwarders are declared for the outermost type only.
        let top = full_name.split('+').next().unwrap_or(full_name);
        let Some(target) = self.modules[module].forwarder(top).map(str::to_string) else {
            return Err(self.not_found(module, full_name));
        };
        let next = self.load_assembly(&target)?;
        if next == module {
            return Err(self.not_found(module, full_name));
        }
        self.find_type(next, full_name, depth + 1)
    }

    fn not_found(&self, module: usize, full_name: &str) -> LoadError {
        LoadError::TypeNotFound {
            assembly: self.modules[module].assembly_name().to_string(),
            type_name: full_name.to_string(),
        }
    }

    /// Resolve a reference made from `module` to its definition.
    pub fn resolve_ref(
        &mut self,
        module: usize,
        reference: &TypeRefSig,
    ) -> Result<TypeKey, LoadError> {
        self.resolve_ref_at(module, reference, 0)
    }

    fn resolve_ref_at(
        &mut self,
        module: usize,
        reference: &TypeRefSig,
        depth: usize,
    ) -> Result<TypeKey, LoadError> {
        let cache_key = (module, reference.clone());
        if let Some(key) = self.refs.get(&cache_key) {
            return Ok(*key);
        }
        if depth >= MAX_DEPTH {
            return Err(LoadError::Malformed(format!(
                "reference to `{}` nests too deeply",
                reference.name
            )));
        }

        let full_name = qualify(&reference.namespace, &reference.name);
        let key = match &reference.scope {
            ResolutionScope::Module => self.find_type(module, &full_name, 0)?,
            ResolutionScope::AssemblyRef(assembly) => {
                let target = self.load_assembly(assembly)?;
                self.find_type(target, &full_name, 0)?
            }
            ResolutionScope::Enclosing(outer) => {
                let outer = self.resolve_ref_at(module, outer, depth + 1)?;
                let nested = format!("{}+{}", self.full_name(outer), reference.name);
                self.find_type(outer.module, &nested, 0)?
            }
            ResolutionScope::ModuleRef => {
                return Err(LoadError::Malformed(format!(
                    "`{}` lives in another module of a multi-module assembly",
                    full_name
                )))
            }
        };

        self.refs.insert(cache_key, key);
        Ok(key)
    }

    /// Resolve a type signature appearing in `module`.
    pub fn resolve_sig(&mut self, module: usize, sig: &TypeSig) -> Result<TypeExpr, LoadError> {
        Ok(match sig {
            TypeSig::Def(def) => TypeExpr::Named {
                key: TypeKey { module, def: *def },
                args: Vec::new(),
            },
            TypeSig::Ref(reference) => TypeExpr::Named {
                key: self.resolve_ref(module, reference)?,
                args: Vec::new(),
            },
            TypeSig::GenericInst { base, args } => {
                let Some(key) = self.resolve_sig(module, base)?.key() else {
                    return Err(LoadError::Malformed(
                        "generic base is not a named type".into(),
                    ));
                };
                // Unresolvable arguments leave the open generic name.
                let args = args
                    .iter()
                    .map(|a| self.resolve_sig(module, a))
                    .collect::<Result<Vec<_>, _>>()
                    .unwrap_or_default();
                TypeExpr::Named { key, args }
            }
            TypeSig::Var(i) => TypeExpr::Var(*i),
            TypeSig::MVar(i) => TypeExpr::MVar(*i),
            TypeSig::Other(name) => TypeExpr::Opaque(name.clone()),
        })
    }

    /// Direct base of a definition, if it has one.
    pub fn direct_base(&mut self, key: TypeKey) -> Result<Option<TypeExpr>, LoadError> {
        let extends = self.modules[key.module]
            .type_def(key.def)
            .and_then(|def| def.extends.clone());
        extends
            .map(|sig| self.resolve_sig(key.module, &sig))
            .transpose()
    }

    /// Base chain and flattened interface set of a definition.
    pub fn shape(&mut self, key: TypeKey) -> Result<Shape, LoadError> {
        if let Some(shape) = self.shapes.get(&key) {
            return Ok(shape.clone());
        }
        if !self.in_progress.insert(key) {
            return Err(LoadError::Cycle(self.full_name(key)));
        }
        let result = self.compute_shape(key);
        self.in_progress.remove(&key);

        let shape = result?;
        self.shapes.insert(key, shape.clone());
        Ok(shape)
    }

    fn compute_shape(&mut self, key: TypeKey) -> Result<Shape, LoadError> {
        let mut shape = Shape::default();
        let mut seen = HashSet::new();

        let declared = self.modules[key.module]
            .type_def(key.def)
            .map(|def| def.interfaces.clone())
            .unwrap_or_default();
        for sig in declared {
            let iface = self.resolve_sig(key.module, &sig)?;
            self.push_interface(&mut shape, &mut seen, iface.clone());
            if let Some(iface_key) = iface.key() {
                for inherited in self.shape(iface_key)?.interfaces {
                    self.push_interface(&mut shape, &mut seen, inherited.substitute(iface.args()));
                }
            }
        }

        if let Some(base) = self.direct_base(key)? {
            shape.base_chain.push(base.clone());
            if let Some(base_key) = base.key() {
                let inherited = self.shape(base_key)?;
                shape.base_chain.extend(
                    inherited
                        .base_chain
                        .iter()
                        .map(|b| b.substitute(base.args())),
                );
                for iface in inherited.interfaces {
                    self.push_interface(&mut shape, &mut seen, iface.substitute(base.args()));
                }
            }
        }

        Ok(shape)
    }

    fn push_interface(&self, shape: &mut Shape, seen: &mut HashSet<String>, iface: TypeExpr) {
        if seen.insert(self.render(&iface).full_name) {
            shape.interfaces.push(iface);
        }
    }

    /// Display names of a type expression.
    pub fn render(&self, expr: &TypeExpr) -> TypeName {
        match expr {
            TypeExpr::Named { key, args } => {
                let name = self.modules[key.module]
                    .type_def(key.def)
                    .map(|d| d.name.clone())
                    .unwrap_or_default();
                let mut full_name = self.full_name(*key);
                if !args.is_empty() {
                    let rendered: Vec<_> = args
                        .iter()
                        .map(|a| format!("[{}]", self.render(a).full_name))
                        .collect();
                    full_name = format!("{}[{}]", full_name, rendered.join(","));
                }
                TypeName { name, full_name }
            }
            TypeExpr::Opaque(full) => TypeName {
                name: full.rsplit('.').next().unwrap_or(full).to_string(),
                full_name: full.clone(),
            },
            TypeExpr::Var(i) => TypeName::same(format!("!{}", i)),
            TypeExpr::MVar(i) => TypeName::same(format!("!!{}", i)),
        }
    }
}
