//! Wrapper assembly — classified declarations → one C++ header.
//!
//! Order: preamble, flag enums, `raw` passthroughs, object classes, free
//! functions, closing brace.

use anyhow::Result;
use tracing::debug;

use crate::config::{ApiConfig, OutputConfig};
use crate::enums;
use crate::model::*;
use crate::object;
use crate::shape::{self, CallSite};
use crate::typemap::{GEOMETRY, TypeMapper};

/// Emit the complete header.
pub fn emit_header(
    declarations: &[Declaration],
    macros: &MacroTable,
    flags: &FlagRegistry,
    objects: &ObjectRegistry,
    api: &ApiConfig,
    output: &OutputConfig,
) -> Result<String> {
    let mapper = TypeMapper::new(objects, api, output);

    let classes = object::emit_classes(declarations, objects, &mapper, api)?;
    let free: Vec<&Declaration> = declarations
        .iter()
        .filter(|d| !classes.consumed.contains(&d.name))
        .collect();
    debug!(
        consumed = classes.consumed.len(),
        free = free.len(),
        "assigned declarations"
    );

    let mut txt = preamble(api, output);
    txt.push_str(&enums::emit_enums(flags, macros, api));
    txt.push_str(&emit_raw_namespace(declarations, &mapper, api));
    txt.push_str(&classes.text());
    txt.push_str(&emit_free_functions(&free, &mapper, api));
    txt.push_str(&closing(output));
    Ok(txt)
}

// ---------------------------------------------------------------------------
// Fixed text
// ---------------------------------------------------------------------------

const INSTANCE_CACHE: &str = "\
// Live wrappers keyed by raw handle: at most one wrapper is alive per handle.
// A wrapper's destructor forgets its slot, so the map only holds handles
// that are still wrapped. Not synchronised; wrapping and releasing from
// several threads at once needs external locking.
template <typename Raw, typename Wrapper>
class InstanceCache
{
    std::unordered_map<Raw*, std::weak_ptr<Wrapper>> _entries;

public:
    std::shared_ptr<Wrapper> lookup(Raw* ptr, bool owned = true)
    {
        if (!ptr) return nullptr;
        std::weak_ptr<Wrapper>& slot = _entries[ptr];
        if (std::shared_ptr<Wrapper> live = slot.lock()) return live;
        std::shared_ptr<Wrapper> fresh(new Wrapper(ptr, owned));
        slot = fresh;
        return fresh;
    }

    void forget(Raw* ptr)
    {
        auto it = _entries.find(ptr);
        if (it != _entries.end() && it->second.expired()) _entries.erase(it);
    }

    void clear() { _entries.clear(); }
    size_t size() const { return _entries.size(); }
};

";

fn preamble(api: &ApiConfig, output: &OutputConfig) -> String {
    let ns = &output.namespace;
    let mut txt = format!(
        "\
#pragma once
// Autogenerated by bnd-cxx. Do not edit.

#include <{include}>
#include <cstddef>
#include <memory>
#include <stdexcept>
#include <string>
#include <unordered_map>
#include <vector>

namespace {ns} {{

class Error : public std::runtime_error
{{
public:
    explicit Error(const char* msg) : std::runtime_error(msg ? msg : \"\") {{ }}
}};

",
        include = output.include,
    );

    if let Some(guid) = &api.guid_type {
        txt.push_str(&format!(
            "\
inline bool operator!(const {guid}& id)
{{
    for (size_t i = 0; i < sizeof(id.data); i++)
    {{
        if (id.data[i] != 0) return false;
    }}
    return true;
}}

"
        ));
    }

    txt.push_str(
        "\
inline std::string text(const char* s) { return s ? std::string(s) : std::string(); }

template <typename W>
auto unwrap(const std::shared_ptr<W>& handle) -> decltype(handle->get())
{
    return handle ? handle->get() : nullptr;
}

",
    );
    txt.push_str(INSTANCE_CACHE);

    for geometry in GEOMETRY {
        txt.push_str(&format!("using {geometry} = {}{geometry};\n", api.prefix));
    }
    txt.push('\n');
    txt
}

fn closing(output: &OutputConfig) -> String {
    format!("}} // namespace {}\n", output.namespace)
}

// ---------------------------------------------------------------------------
// Raw passthroughs
// ---------------------------------------------------------------------------

/// `namespace raw`: one forwarding function per declaration, adding only
/// the sentinel check.
pub fn emit_raw_namespace(declarations: &[Declaration], mapper: &TypeMapper, api: &ApiConfig) -> String {
    let mut txt = String::from("namespace raw\n{\n\n");
    for decl in declarations {
        txt.push_str(&emit_raw_function(decl, mapper, api));
    }
    txt.push_str("} // namespace raw\n\n");
    txt
}

fn emit_raw_function(decl: &Declaration, mapper: &TypeMapper, api: &ApiConfig) -> String {
    let params = decl.raw_params();
    let signature = params
        .iter()
        .map(|p| format!("{} {}", p.ty, p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let call = format!(
        "{}({})",
        decl.name,
        params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let ret = &decl.return_type;
    let cast = if mapper.needs_enum_cast(ret) {
        format!("({ret})")
    } else {
        String::new()
    };
    let throw = format!(
        "throw {}::Error({}());",
        mapper.namespace(),
        api.error_accessor
    );

    let body = match (decl.signals_error, ret.is_void()) {
        (false, true) => format!("{call};"),
        (false, false) => format!("return {cast}{call};"),
        // Narrowed bool sentinel.
        (true, true) => format!("if (!{call}) {throw}"),
        (true, false) => format!("auto _ret = {call}; if (!_ret) {throw} return {cast}_ret;"),
    };

    format!(
        "//! @copydoc {}()\ninline {ret} {}({signature}) {{ {body} }}\n\n",
        decl.name,
        api.short_name(&decl.name)
    )
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Wrapper functions for every declaration no object class took over.
pub fn emit_free_functions(declarations: &[&Declaration], mapper: &TypeMapper, api: &ApiConfig) -> String {
    let mut txt = String::new();
    for decl in declarations {
        let name = api.short_name(&decl.name);
        let callee = format!("raw::{name}");
        let site = CallSite {
            callee: &callee,
            receiver: None,
            owns_result: false,
        };
        let ret = mapper.wrapper_return(decl);
        let params = shape::signature_params(mapper, decl, &site);
        let body = shape::render_body(mapper, decl, &site, "    ", api.list_release.as_deref());
        txt.push_str(&format!("inline {ret} {name}({params})\n{{\n{body}}}\n\n"));
    }
    txt
}
