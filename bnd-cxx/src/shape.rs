//! Shape templates — one fixed function body per calling convention, used by
//! both object methods and free functions.
//!
//! Bodies always call the raw passthrough, which already performs the
//! sentinel check, so a failing call surfaces here as a thrown error.

use crate::model::*;
use crate::typemap::{TypeMapper, list_element, out_pointee};

/// Where the wrapper sends its call.
pub struct CallSite<'a> {
    /// Raw passthrough, e.g. `raw::GetWindowSize`.
    pub callee: &'a str,
    /// Expression replacing the first parameter (the object receiver).
    pub receiver: Option<&'a str>,
    /// Whether a returned handle is owned by the wrapper (factories only).
    pub owns_result: bool,
}

/// Wrapper parameter list, receiver and out-parameters removed.
pub fn signature_params(mapper: &TypeMapper, decl: &Declaration, site: &CallSite) -> String {
    wrapper_params(decl, site)
        .iter()
        .map(|p| mapper.map_param(p))
        .collect::<Vec<_>>()
        .join(", ")
}

fn wrapper_params<'d>(decl: &'d Declaration, site: &CallSite) -> &'d [Param] {
    let visible = decl.visible_params();
    match site.receiver {
        Some(_) if !visible.is_empty() => &visible[1..],
        _ => visible,
    }
}

/// Mapped arguments for the visible parameters, receiver first.
fn arguments(mapper: &TypeMapper, decl: &Declaration, site: &CallSite) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(receiver) = site.receiver {
        args.push(receiver.to_string());
    }
    args.extend(wrapper_params(decl, site).iter().map(|p| mapper.map_argument(p)));
    args
}

/// Render the statements of a wrapper body, one per line, each prefixed with
/// `indent`.
pub fn render_body(
    mapper: &TypeMapper,
    decl: &Declaration,
    site: &CallSite,
    indent: &str,
    list_release: Option<&str>,
) -> String {
    let mut args = arguments(mapper, decl, site);
    let callee = site.callee;
    let ns = mapper.namespace();

    let lines: Vec<String> = match decl.shape {
        Shape::Plain => {
            let call = format!("{callee}({})", args.join(", "));
            if decl.return_type.is_void() {
                vec![format!("{call};")]
            } else {
                let result = mapper.map_return(&decl.return_type, &call, site.owns_result);
                vec![format!("return {result};")]
            }
        }
        Shape::ListProducing => {
            let count_ty = decl
                .count
                .as_ref()
                .and_then(|c| c.ty.pointee())
                .unwrap_or_else(|| TypeExpr::new("int"));
            let element = list_element(decl);
            let list_ty = mapper.wrapper_return(decl);
            args.push("&_count".to_string());
            let mut lines = vec![
                format!("{count_ty} _count = 0;"),
                format!("auto _ret = {callee}({});", args.join(", ")),
                format!("{list_ty} _list;"),
                "if (_ret)".to_string(),
                "{".to_string(),
                "    _list.reserve(_count);".to_string(),
                format!(
                    "    for ({count_ty} _i = 0; _i < _count; _i++) _list.push_back({});",
                    mapper.map_return(&element, "_ret[_i]", false)
                ),
            ];
            if decl.release_list
                && let Some(release) = list_release
            {
                lines.push(format!("    {release}((void*)_ret);"));
            }
            lines.push("}".to_string());
            lines.push("return _list;".to_string());
            lines
        }
        Shape::ObjectOutParam => {
            let out = out_pointee(decl);
            args.push("&_out".to_string());
            vec![
                format!("{out} _out{{}};"),
                format!("{callee}({});", args.join(", ")),
                format!("return {};", mapper.map_return(&out, "_out", false)),
            ]
        }
        Shape::PointOut | Shape::FPointOut | Shape::RectOut | Shape::FRectOut => {
            let (value_ty, fields): (&str, &[&str]) = match decl.shape {
                Shape::PointOut => ("Point", &["x", "y"][..]),
                Shape::FPointOut => ("FPoint", &["x", "y"][..]),
                Shape::RectOut => ("Rect", &["x", "y", "w", "h"][..]),
                _ => ("FRect", &["x", "y", "w", "h"][..]),
            };
            args.extend(fields.iter().map(|f| format!("&_v.{f}")));
            vec![
                format!("{ns}::{value_ty} _v{{}};"),
                format!("{callee}({});", args.join(", ")),
                "return _v;".to_string(),
            ]
        }
    };

    lines
        .iter()
        .map(|l| format!("{indent}{l}\n"))
        .collect()
}
