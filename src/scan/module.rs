//! Managed module contents, read through `dotscope`.
//!
//! A module is parsed once and the parts of its type registry the scanner
//! needs are copied out: definitions with their base and declared
//! interfaces, plus a scope-qualified form of every type those positions
//! name. Nothing in the module is executed.

use std::collections::HashMap;
use std::path::Path;

use dotscope::metadata::typesystem::{CilFlavor, CilType, CilTypeReference};
use dotscope::{CilObject, ValidationConfig};

/// Type attribute bits (ECMA-335 II.23.1.15).
pub mod type_attributes {
    pub const VISIBILITY_MASK: u32 = 0x07;
    pub const PUBLIC: u32 = 0x01;
    pub const NESTED_PUBLIC: u32 = 0x02;
    pub const INTERFACE: u32 = 0x20;
    pub const ABSTRACT: u32 = 0x80;
}

/// Token table of `TypeDef` rows.
const TYPE_DEF_TABLE: u32 = 0x02;

/// Nesting followed when converting a reference; deeper chains are dropped.
const MAX_NESTING: usize = 32;

/// Where a type reference points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// The referencing module itself, or its exported types
    Module,
    /// Another module of the same assembly
    ModuleRef,
    /// Another assembly, by simple name
    AssemblyRef(String),
    /// Enclosing type of a nested reference
    Enclosing(Box<TypeRefSig>),
}

/// A type defined outside the referencing module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRefSig {
    pub scope: ResolutionScope,
    pub namespace: String,
    pub name: String,
}

/// A type in base, interface, or generic-argument position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSig {
    /// Definition in the same module, by index
    Def(usize),
    Ref(TypeRefSig),
    GenericInst {
        base: Box<TypeSig>,
        args: Vec<TypeSig>,
    },
    /// Generic parameter of the enclosing type
    Var(u32),
    /// Generic parameter of a method
    MVar(u32),
    /// Primitives, arrays, pointers and the like, by display name
    Other(String),
}

/// A type defined in the module.
#[derive(Debug, Clone)]
pub struct TypeDefRow {
    pub flags: u32,
    pub name: String,
    pub namespace: String,
    pub extends: Option<TypeSig>,
    /// Interfaces declared directly on the type
    pub interfaces: Vec<TypeSig>,
    /// Index of the enclosing definition
    pub enclosing: Option<usize>,
}

/// Structural metadata of one module.
#[derive(Debug)]
pub struct ModuleMetadata {
    assembly_name: String,
    type_defs: Vec<TypeDefRow>,
    /// Full name -> assembly the type is forwarded to
    forwarders: HashMap<String, String>,
    /// Full name -> definition index
    by_full_name: HashMap<String, usize>,
}

impl ModuleMetadata {
    /// Read a module from disk.
    pub fn load(path: &Path) -> dotscope::Result<Self> {
        let object = CilObject::from_path_with_validation(path, ValidationConfig::minimal())?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_object(&object, fallback))
    }

    fn from_object(object: &CilObject, fallback_name: String) -> Self {
        let assembly_name = object
            .assembly()
            .map(|a| a.name.clone())
            .unwrap_or(fallback_name);

        let registry = object.types();
        let mut defs: Vec<_> = registry
            .all_types()
            .into_iter()
            .filter(|ty| ty.token.value() >> 24 == TYPE_DEF_TABLE)
            .collect();
        defs.sort_by_key(|ty| ty.token.value());

        let by_token: HashMap<u32, usize> = defs
            .iter()
            .enumerate()
            .map(|(i, ty)| (ty.token.value(), i))
            .collect();

        let mut enclosing = HashMap::new();
        for (outer, ty) in defs.iter().enumerate() {
            for (_, nested) in ty.nested_types.iter() {
                let inner = nested
                    .upgrade()
                    .and_then(|n| by_token.get(&n.token.value()).copied());
                if let Some(inner) = inner {
                    enclosing.insert(inner, outer);
                }
            }
        }

        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (i, ty) in defs.iter().enumerate() {
            if !enclosing.contains_key(&i) {
                by_name.insert(qualify(&ty.namespace, &ty.name), i);
            }
        }

        let signatures = Signatures {
            by_token: &by_token,
            by_name: &by_name,
        };
        let type_defs = defs
            .iter()
            .enumerate()
            .map(|(i, ty)| TypeDefRow {
                flags: ty.flags,
                name: ty.name.clone(),
                namespace: ty.namespace.clone(),
                extends: ty.base().map(|base| signatures.of(&base, 0)),
                interfaces: ty
                    .interfaces
                    .iter()
                    .filter_map(|(_, iface)| iface.upgrade())
                    .map(|iface| signatures.of(&iface, 0))
                    .collect(),
                enclosing: enclosing.get(&i).copied(),
            })
            .collect();

        let mut forwarders = HashMap::new();
        for entry in object.exports().cil().iter() {
            let export = entry.value();
            if let Some(CilTypeReference::AssemblyRef(target)) = export.get_implementation() {
                let namespace = export.namespace.as_deref().unwrap_or("");
                forwarders.insert(qualify(namespace, &export.name), target.name.clone());
            }
        }

        let mut module = ModuleMetadata {
            assembly_name,
            type_defs,
            forwarders,
            by_full_name: HashMap::new(),
        };
        module.by_full_name = (0..module.type_defs.len())
            .map(|i| (module.full_name(i), i))
            .collect();
        module
    }

    /// Simple name of the assembly this module belongs to.
    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    /// Number of type definitions, `<Module>` included.
    pub fn len(&self) -> usize {
        self.type_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.type_defs.is_empty()
    }

    pub fn type_def(&self, index: usize) -> Option<&TypeDefRow> {
        self.type_defs.get(index)
    }

    /// Enclosing definition of a nested type.
    pub fn enclosing(&self, index: usize) -> Option<usize> {
        self.type_defs.get(index)?.enclosing
    }

    /// Look a type up by full name (`Ns.Outer+Inner`).
    pub fn find_type(&self, full_name: &str) -> Option<usize> {
        self.by_full_name.get(full_name).copied()
    }

    /// Assembly a top-level type is forwarded to.
    pub fn forwarder(&self, full_name: &str) -> Option<&str> {
        self.forwarders.get(full_name).map(String::as_str)
    }

    /// Full name of a definition: `Ns.Name`, or `Ns.Outer+Inner` when nested.
    pub fn full_name(&self, index: usize) -> String {
        let mut index = index;
        let mut parts = Vec::new();
        // Bounded so a malformed nesting cycle cannot loop forever.
        for _ in 0..=self.type_defs.len() {
            let Some(def) = self.type_def(index) else { break };
            parts.push(def.name.as_str());
            match def.enclosing {
                Some(outer) => index = outer,
                None => {
                    parts.reverse();
                    return qualify(&def.namespace, &parts.join("+"));
                }
            }
        }
        parts.reverse();
        parts.join("+")
    }
}

/// Converts registry entries into module-relative signatures.
struct Signatures<'a> {
    by_token: &'a HashMap<u32, usize>,
    by_name: &'a HashMap<String, usize>,
}

impl Signatures<'_> {
    fn of(&self, ty: &CilType, depth: usize) -> TypeSig {
        if let CilFlavor::GenericParameter { index, method } = ty.flavor() {
            let index: u32 = index.to_owned();
            return if method.to_owned() {
                TypeSig::MVar(index)
            } else {
                TypeSig::Var(index)
            };
        }

        let named = self.named(ty, depth);
        let args: Vec<TypeSig> = ty
            .generic_args
            .iter()
            .flat_map(|(_, spec)| {
                spec.generic_args
                    .iter()
                    .filter_map(|(_, arg)| arg.upgrade())
                    .collect::<Vec<_>>()
            })
            .map(|arg| self.of(&arg, depth + 1))
            .collect();
        if args.is_empty() || depth >= MAX_NESTING {
            named
        } else {
            TypeSig::GenericInst {
                base: Box::new(named),
                args,
            }
        }
    }

    fn named(&self, ty: &CilType, depth: usize) -> TypeSig {
        if let Some(index) = self.by_token.get(&ty.token.value()) {
            return TypeSig::Def(*index);
        }
        if let Some(reference) = type_ref(ty, depth) {
            return TypeSig::Ref(reference);
        }
        let full_name = qualify(&ty.namespace, &ty.name);
        match self.by_name.get(&full_name) {
            Some(index) => TypeSig::Def(*index),
            None => TypeSig::Other(full_name),
        }
    }
}

/// Scope-qualified form of a type that lives outside this module.
fn type_ref(ty: &CilType, depth: usize) -> Option<TypeRefSig> {
    if depth >= MAX_NESTING {
        return None;
    }
    let scope = match ty.get_external()? {
        CilTypeReference::AssemblyRef(assembly) => {
            ResolutionScope::AssemblyRef(assembly.name.clone())
        }
        CilTypeReference::TypeRef(outer) => {
            let outer = outer.upgrade()?;
            ResolutionScope::Enclosing(Box::new(type_ref(&outer, depth + 1)?))
        }
        CilTypeReference::ModuleRef(_) => ResolutionScope::ModuleRef,
        _ => ResolutionScope::Module,
    };
    Some(TypeRefSig {
        scope,
        namespace: ty.namespace.clone(),
        name: ty.name.clone(),
    })
}

/// `namespace.name`, or `name` in the global namespace.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}
