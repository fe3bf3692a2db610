//! Name matching and conformance predicates over type descriptors.

use serde::{Deserialize, Serialize};

use crate::core::errors::{Error, Result};

use super::index::TypeDescriptor;

/// Which types a query may return, and how query names are compared.
///
/// Every flag defaults to false, the most restrictive setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanOptions {
    /// Compare interface/base names by full name instead of simple name
    pub match_full_name: bool,
    pub include_abstract: bool,
    pub include_non_public: bool,
    /// Also return value types
    pub include_structs: bool,
    pub include_nested_types: bool,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_full_name(mut self, yes: bool) -> Self {
        self.match_full_name = yes;
        self
    }

    pub fn include_abstract(mut self, yes: bool) -> Self {
        self.include_abstract = yes;
        self
    }

    pub fn include_non_public(mut self, yes: bool) -> Self {
        self.include_non_public = yes;
        self
    }

    pub fn include_structs(mut self, yes: bool) -> Self {
        self.include_structs = yes;
        self
    }

    pub fn include_nested_types(mut self, yes: bool) -> Self {
        self.include_nested_types = yes;
        self
    }

    /// Whether a type is eligible at all, before any name comparison.
    pub fn includes(&self, ty: &TypeDescriptor) -> bool {
        if ty.is_interface || (ty.is_value_type && !self.include_structs) {
            return false;
        }
        if ty.is_abstract && !self.include_abstract {
            return false;
        }
        if !(ty.is_public || ty.is_nested_public) && !self.include_non_public {
            return false;
        }
        if ty.is_nested && !self.include_nested_types {
            return false;
        }
        true
    }
}

/// Arity-suffixed metadata name: `generic_name("Handler", 2)` is `Handler`2`.
///
/// Arity 0 leaves the name unchanged.
pub fn generic_name(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{}`{}", name, arity)
    }
}

/// Simple and full display names of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeName {
    /// Unqualified name with arity suffix, e.g. `List`1`
    pub name: String,
    /// Namespace-qualified name, with type arguments when instantiated
    pub full_name: String,
}

impl TypeName {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        TypeName {
            name: name.into(),
            full_name: full_name.into(),
        }
    }

    pub(crate) fn same(name: String) -> Self {
        TypeName {
            full_name: name.clone(),
            name,
        }
    }

    pub(crate) fn with_suffix(self, suffix: &str) -> Self {
        TypeName {
            name: self.name + suffix,
            full_name: self.full_name + suffix,
        }
    }

    /// Compare against a search term. Full mode ignores type arguments.
    pub fn matches(&self, term: &str, full_name: bool) -> bool {
        name_matches(&self.name, &self.full_name, term, full_name)
    }
}

fn name_matches(name: &str, full_name: &str, term: &str, by_full_name: bool) -> bool {
    if by_full_name {
        // Cut at the start of the type-argument list.
        let open = full_name.find('[').map_or(full_name, |i| &full_name[..i]);
        open == term
    } else {
        name == term
    }
}

/// What a query type must conform to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conformance {
    /// Some interface in the flattened interface set matches
    Implements,
    /// Some ancestor in the base chain matches
    DerivesFrom,
}

/// A validated conformance query.
#[derive(Debug, Clone)]
pub struct TypeQuery {
    conformance: Conformance,
    names: Vec<String>,
    options: ScanOptions,
    target: Option<(String, bool)>,
}

impl TypeQuery {
    /// Types implementing any of `names`.
    pub fn implementing<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Conformance::Implements, names)
    }

    /// Types deriving, directly or not, from any of `names`.
    pub fn deriving<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Conformance::DerivesFrom, names)
    }

    fn new<I, S>(conformance: Conformance, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Validation { what: "query names" });
        }
        for name in &names {
            Error::require_non_blank(name, "query name")?;
        }
        Ok(TypeQuery {
            conformance,
            names,
            options: ScanOptions::default(),
            target: None,
        })
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Only match the type named `target`, compared by full name when
    /// `full_name` is set.
    pub fn named(mut self, target: impl Into<String>, full_name: bool) -> Result<Self> {
        let target = target.into();
        Error::require_non_blank(&target, "target type name")?;
        self.target = Some((target, full_name));
        Ok(self)
    }

    pub fn conformance(&self) -> Conformance {
        self.conformance
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Target name, then inclusion, then conformance.
    pub fn matches(&self, ty: &TypeDescriptor) -> bool {
        if let Some((target, full)) = &self.target {
            if !name_matches(&ty.name, &ty.full_name, target, *full) {
                return false;
            }
        }
        if !self.options.includes(ty) {
            return false;
        }

        let candidates = match self.conformance {
            Conformance::Implements => &ty.interfaces,
            Conformance::DerivesFrom => &ty.base_types,
        };
        let full = self.options.match_full_name;
        candidates
            .iter()
            .any(|c| self.names.iter().any(|n| c.matches(n, full)))
    }

    /// Every matching type, in input order.
    pub fn find_all<'t, I>(&self, types: I) -> Vec<&'t TypeDescriptor>
    where
        I: IntoIterator<Item = &'t TypeDescriptor>,
    {
        types.into_iter().filter(|t| self.matches(t)).collect()
    }

    /// The first matching type. Stops consuming `types` once found.
    pub fn find_first<'t, I>(&self, types: I) -> Option<&'t TypeDescriptor>
    where
        I: IntoIterator<Item = &'t TypeDescriptor>,
    {
        types.into_iter().find(|t| self.matches(t))
    }
}
