//! Extraction — catalogue entries → unclassified [`Declaration`]s.
//!
//! Drops what the wrapper type system cannot represent (variadics, names
//! outside the library prefix, duplicates), names anonymous parameters and
//! rewrites bitmask flag types to the enums emitted for them.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::config::ApiConfig;
use crate::model::*;

/// Normalise the whole catalogue, preserving its order.
pub fn extract_declarations(
    catalogue: &[CatalogueEntry],
    api: &ApiConfig,
    flags: &FlagRegistry,
    namespace: &str,
) -> Result<Vec<Declaration>> {
    let mut declarations = Vec::new();
    let mut seen = HashSet::new();
    for entry in catalogue {
        if !entry.name.starts_with(api.prefix.as_str()) {
            trace!(name = %entry.name, "skipping declaration outside library prefix");
            continue;
        }
        // Variadics cannot be forwarded through a fixed wrapper signature.
        if entry.variadic || entry.params.iter().any(|p| p.ty.as_str() == "...") {
            debug!(name = %entry.name, "skipping variadic function");
            continue;
        }
        if !seen.insert(entry.name.clone()) {
            trace!(name = %entry.name, "skipping duplicate function");
            continue;
        }
        let decl = extract_function(entry, api, flags, namespace)
            .with_context(|| format!("{}:{}: `{}`", entry.file.display(), entry.line, entry.name))?;
        debug!(name = %decl.name, params = decl.params.len(), "extracted function");
        declarations.push(decl);
    }
    Ok(declarations)
}

fn extract_function(
    entry: &CatalogueEntry,
    api: &ApiConfig,
    flags: &FlagRegistry,
    namespace: &str,
) -> Result<Declaration> {
    let return_type = resolve_flag_type(&entry.return_type, flags, api, namespace)?;

    let mut params = Vec::new();
    for (i, p) in entry.params.iter().enumerate() {
        // `f(void)` lists a single anonymous void parameter.
        if p.name.is_empty() && p.ty.is_void() {
            continue;
        }
        let name = if p.name.is_empty() {
            format!("param{i}")
        } else {
            sanitize_ident(&p.name)
        };
        let ty = resolve_flag_type(&p.ty, flags, api, namespace)
            .with_context(|| format!("parameter `{name}`"))?;
        params.push(Param { ty, name });
    }

    Ok(Declaration {
        name: entry.name.clone(),
        return_type,
        params,
        count: None,
        file: entry.file.clone(),
        line: entry.line,
        signals_error: false,
        release_list: false,
        shape: Shape::Plain,
    })
}

/// Rewrite `SDL_WindowFlags` to `SDL::WindowFlags` when the flag registry
/// gives it a prefix, whatever the type is called.  Unregistered types whose
/// name mentions `Flags` are rejected.
pub fn resolve_flag_type(
    ty: &TypeExpr,
    flags: &FlagRegistry,
    api: &ApiConfig,
    namespace: &str,
) -> Result<TypeExpr> {
    let base = ty.base();
    match flags.get(base) {
        None if base.contains("Flags") => anyhow::bail!(
            "type `{base}` looks like a flag type but is not listed in the flag registry"
        ),
        None => Ok(ty.clone()),
        // An enum pointer does not convert to the C integer pointer, so only
        // values are rewritten.
        Some(spec) if spec.prefix().is_some() && !ty.is_pointer() => {
            Ok(ty.replace_base(&format!("{namespace}::{}", api.short_name(base))))
        }
        Some(_) => Ok(ty.clone()),
    }
}

/// Whether `ty` names one of the emitted flag enums.
pub fn is_flag_enum(ty: &TypeExpr, namespace: &str) -> bool {
    ty.base()
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with("::"))
}

/// Append `_` to parameter names that are C++ keywords (`new`, `class`, …),
/// which are legal in C headers but not in the emitted C++.
fn sanitize_ident(name: &str) -> String {
    if is_cxx_keyword(name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

fn is_cxx_keyword(name: &str) -> bool {
    matches!(
        name,
        "and"
            | "bitand"
            | "bitor"
            | "catch"
            | "class"
            | "compl"
            | "delete"
            | "explicit"
            | "export"
            | "friend"
            | "mutable"
            | "namespace"
            | "new"
            | "not"
            | "operator"
            | "or"
            | "private"
            | "protected"
            | "public"
            | "template"
            | "this"
            | "throw"
            | "try"
            | "typename"
            | "using"
            | "virtual"
            | "xor"
    )
}
