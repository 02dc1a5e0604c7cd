//! Declaration model — what extraction produces, the classifier annotates and
//! the emitters read.
//!
//! Everything here is plain data: the JSON documents deserialize straight into
//! these types, and the type mapper and emitters only ever read them.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Type expressions
// ---------------------------------------------------------------------------

/// Type qualifiers that never name a type on their own.
const QUALIFIERS: &[&str] = &["const", "volatile", "restrict", "struct", "enum", "union"];

/// A C type in textual form, e.g. `const char*` or `SDL_Window**`.
///
/// Equality is textual after whitespace canonicalisation: `const char *` and
/// `const char*` compare equal, `char const*` does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub struct TypeExpr(String);

impl TypeExpr {
    pub fn new(text: &str) -> Self {
        Self(canonicalize(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_void(&self) -> bool {
        self.0 == "void"
    }

    pub fn is_pointer(&self) -> bool {
        self.0.ends_with('*')
    }

    /// Add one level of pointer indirection.
    pub fn pointer(&self) -> Self {
        Self(format!("{}*", self.0))
    }

    /// Remove one level of pointer indirection, or `None` for non-pointers.
    ///
    /// A top-level `const` on the pointee is dropped (`T* const*` → `T*`), so
    /// the result can be declared as a local.
    pub fn pointee(&self) -> Option<Self> {
        let inner = self.0.strip_suffix('*')?.trim_end();
        let inner = match inner.strip_suffix(" const") {
            Some(rest) if rest.ends_with('*') => rest,
            _ => inner,
        };
        Some(Self(inner.to_string()))
    }

    /// Prefix a qualifier such as `const`.
    pub fn with_qualifier(&self, qualifier: &str) -> Self {
        Self::new(&format!("{qualifier} {}", self.0))
    }

    /// Whether the outermost pointee is `const` (`const T*`).
    pub fn is_const_pointer(&self) -> bool {
        self.pointee()
            .is_some_and(|p| !p.is_pointer() && p.0.split_whitespace().any(|t| t == "const"))
    }

    /// The type with leading qualifiers removed (`const SDL_Rect` → `SDL_Rect`).
    /// Pointer stars are kept.
    pub fn unqualified(&self) -> Self {
        let kept: Vec<&str> = self
            .0
            .split_whitespace()
            .filter(|t| !QUALIFIERS.contains(t))
            .collect();
        Self::new(&kept.join(" "))
    }

    /// The named type at the core of this expression, without qualifiers or
    /// pointers (`const SDL_Window**` → `SDL_Window`).
    pub fn base(&self) -> &str {
        self.0
            .split(|c: char| c.is_whitespace() || c == '*')
            .filter(|t| !t.is_empty() && !QUALIFIERS.contains(t))
            .next_back()
            .unwrap_or("")
    }

    /// Replace the base identifier, keeping qualifiers and pointers.
    pub fn replace_base(&self, replacement: &str) -> Self {
        let base = self.base();
        if base.is_empty() {
            return self.clone();
        }
        let idx = self.0.rfind(base).unwrap_or(0);
        let mut text = self.0.clone();
        text.replace_range(idx..idx + base.len(), replacement);
        Self(text)
    }
}

impl From<String> for TypeExpr {
    fn from(text: String) -> Self {
        Self::new(&text)
    }
}

impl From<&str> for TypeExpr {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse whitespace runs and glue `*` to the token before it.
fn canonicalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for token in text.split_whitespace() {
        if !out.is_empty() && !token.starts_with('*') {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ty: TypeExpr,
    pub name: String,
}

impl Param {
    pub fn new(ty: impl Into<TypeExpr>, name: &str) -> Self {
        Self {
            ty: ty.into(),
            name: name.to_string(),
        }
    }
}

/// Calling-convention shape of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Forward arguments, return the mapped result.
    Plain,
    /// Trailing `int* count`; the result is an array of `count` elements.
    ListProducing,
    /// Single trailing out-pointer whose pointee is the real result.
    ObjectOutParam,
    /// Two trailing `int*` filled as x/y.
    PointOut,
    /// Four trailing `int*` filled as x/y/w/h.
    RectOut,
    /// Two trailing `float*`.
    FPointOut,
    /// Four trailing `float*`.
    FRectOut,
}

impl Shape {
    /// Number of trailing parameters the shape hides from the wrapper
    /// signature.
    pub fn hidden_params(self) -> usize {
        match self {
            Shape::Plain | Shape::ListProducing => 0,
            Shape::ObjectOutParam => 1,
            Shape::PointOut | Shape::FPointOut => 2,
            Shape::RectOut | Shape::FRectOut => 4,
        }
    }
}

/// A classified C function declaration.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    /// Return type. Narrowed from `bool` to `void` when `signals_error` is set.
    pub return_type: TypeExpr,
    /// Declared parameters. For [`Shape::ListProducing`] the trailing count
    /// pointer has been removed and lives in `count`.
    pub params: Vec<Param>,
    /// The stripped trailing `count` parameter of a list-producing call.
    pub count: Option<Param>,
    pub file: PathBuf,
    pub line: usize,
    pub signals_error: bool,
    /// Whether a list-producing wrapper hands the returned array to the
    /// release function after copying it.
    pub release_list: bool,
    pub shape: Shape,
}

impl Declaration {
    /// Parameters as the C function declares them, count pointer included.
    pub fn raw_params(&self) -> Vec<Param> {
        let mut params = self.params.clone();
        params.extend(self.count.clone());
        params
    }

    /// Parameters that remain visible in wrapper signatures (out-parameters
    /// removed).
    pub fn visible_params(&self) -> &[Param] {
        let hidden = self.shape.hidden_params().min(self.params.len());
        &self.params[..self.params.len() - hidden]
    }

    /// Parameters filled by the callee for out-parameter shapes.
    pub fn out_params(&self) -> &[Param] {
        &self.params[self.visible_params().len()..]
    }
}

// ---------------------------------------------------------------------------
// Input documents
// ---------------------------------------------------------------------------

/// One entry of the declaration catalogue as produced by the C parser.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueEntry {
    pub name: String,
    pub return_type: TypeExpr,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    pub file: PathBuf,
    pub line: usize,
    #[serde(default)]
    pub variadic: bool,
}

/// A catalogue parameter. Unnamed parameters carry an empty name.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamEntry {
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub name: String,
}

/// Flat macro name → literal text mapping, in preprocessor order.
pub type MacroTable = IndexMap<String, String>;

/// Classification of one `…Flags`-style integer type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlagSpec {
    /// Bitmask whose values are the macros starting with this prefix.
    Prefix(String),
    /// `false`: an opaque integer, not a bitmask.
    Opaque(bool),
}

impl FlagSpec {
    pub fn prefix(&self) -> Option<&str> {
        match self {
            FlagSpec::Prefix(p) => Some(p),
            FlagSpec::Opaque(_) => None,
        }
    }
}

/// Flag type name → classification, in document order.
pub type FlagRegistry = IndexMap<String, FlagSpec>;

/// Specification of one wrapped object kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectSpec {
    /// Declarations that create the object, each becoming a static factory.
    #[serde(default)]
    pub constructors: Vec<String>,
    /// Declaration that destroys the object. Empty means non-owning.
    pub destructor: String,
    /// Substrings removed, in order, to derive member names.
    #[serde(default)]
    pub rename: Vec<String>,
    /// Declaration name → literal C++ spliced in place of the generated member.
    #[serde(default)]
    pub overrides: IndexMap<String, String>,
}

/// Object type name (e.g. `SDL_Window`) → spec, in document order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ObjectRegistry {
    pub objects: IndexMap<String, ObjectSpec>,
}

impl ObjectRegistry {
    pub fn contains(&self, c_type: &str) -> bool {
        self.objects.contains_key(c_type)
    }

    /// If `ty` is a single pointer to a registered object type, return that
    /// type's name.
    pub fn object_of(&self, ty: &TypeExpr) -> Option<&str> {
        let pointee = ty.pointee()?;
        if pointee.is_pointer() {
            return None;
        }
        let name = pointee.unqualified();
        self.objects
            .get_key_value(name.as_str())
            .map(|(k, _)| k.as_str())
    }
}
