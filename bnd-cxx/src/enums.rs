//! Enum/flag emitter — one C++ `enum` per bitmask flag group, populated from
//! the macro table by prefix.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::ApiConfig;
use crate::model::{FlagRegistry, MacroTable};

/// Enumerators of one flag group: `(stripped name, literal value)`.
pub type Enumerators<'a> = Vec<(&'a str, &'a str)>;

/// Distribute macros over the non-opaque flag groups.
///
/// A macro goes to the group with the longest matching prefix (ties go to
/// the group listed first), so it never lands in two enums.  Every group with
/// a prefix is present in the result, in registry order, even when empty.
pub fn assign_enumerators<'a>(
    flags: &'a FlagRegistry,
    macros: &'a MacroTable,
    api: &ApiConfig,
) -> IndexMap<&'a str, Enumerators<'a>> {
    let mut groups: IndexMap<&str, Enumerators> = flags
        .iter()
        .filter(|(_, spec)| spec.prefix().is_some())
        .map(|(name, _)| (name.as_str(), Vec::new()))
        .collect();

    for (name, value) in macros {
        if api.macro_exclude.iter().any(|p| name.starts_with(p.as_str()))
            || api.macro_exclude_values.iter().any(|v| value.contains(v.as_str()))
        {
            trace!(name = %name, "excluded macro");
            continue;
        }
        let mut best: Option<(&str, &str)> = None;
        for (flag, spec) in flags {
            let Some(prefix) = spec.prefix() else {
                continue;
            };
            if name.starts_with(prefix) && best.is_none_or(|(_, p)| prefix.len() > p.len()) {
                best = Some((flag.as_str(), prefix));
            }
        }
        if let Some((flag, prefix)) = best
            && let Some(group) = groups.get_mut(flag)
        {
            group.push((&name[prefix.len()..], value.as_str()));
        }
    }
    groups
}

/// Emit the enum blocks for every non-opaque flag group.
pub fn emit_enums(flags: &FlagRegistry, macros: &MacroTable, api: &ApiConfig) -> String {
    let mut txt = String::new();
    for (flag, enumerators) in assign_enumerators(flags, macros, api) {
        txt.push_str(&format!("enum {}\n{{\n", api.short_name(flag)));
        let body: Vec<String> = enumerators
            .iter()
            .map(|(name, value)| format!("    {name} = {value}"))
            .collect();
        if !body.is_empty() {
            txt.push_str(&body.join(",\n"));
            txt.push('\n');
        }
        txt.push_str("};\n\n");
        debug!(name = flag, variants = enumerators.len(), "emitted enum");
    }
    txt
}
