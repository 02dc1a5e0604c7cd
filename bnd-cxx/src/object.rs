//! Object lifecycle builder — one C++ class per registered object type.
//!
//! Each class owns (or borrows) a raw handle, is created through static
//! factories that go through its instance cache, destroys the handle when the
//! last `shared_ptr` goes away, and exposes every declaration taking the
//! handle as its first parameter as an instance method.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::debug;

use crate::config::ApiConfig;
use crate::model::*;
use crate::shape::{self, CallSite};
use crate::typemap::TypeMapper;

/// Member names the generated class already uses.
const RESERVED_MEMBERS: &[&str] = &["get", "wrap", "instances"];

/// Emitted object classes plus the declarations they took over.
#[derive(Debug, Default)]
pub struct ObjectClasses {
    /// `class X;` lines so signatures may refer to any class.
    pub forward: String,
    /// Class bodies with member declarations.
    pub classes: String,
    /// Out-of-class definitions of factories and methods.
    pub definitions: String,
    /// Declarations consumed as factories, destructors or methods.
    pub consumed: HashSet<String>,
}

impl ObjectClasses {
    pub fn text(&self) -> String {
        format!("{}\n{}{}", self.forward, self.classes, self.definitions)
    }
}

/// Build every class in registry order.
pub fn emit_classes(
    declarations: &[Declaration],
    objects: &ObjectRegistry,
    mapper: &TypeMapper,
    api: &ApiConfig,
) -> Result<ObjectClasses> {
    let by_name: HashMap<&str, &Declaration> =
        declarations.iter().map(|d| (d.name.as_str(), d)).collect();

    let mut out = ObjectClasses::default();

    // Lifecycle declarations are claimed up front: `SDL_CreateRenderer`
    // takes an `SDL_Window*` but belongs to `Renderer`, not `Window`.
    for (c_type, spec) in &objects.objects {
        for ctor in &spec.constructors {
            let Some(decl) = by_name.get(ctor.as_str()) else {
                anyhow::bail!("object `{c_type}`: constructor `{ctor}` not found in the catalogue");
            };
            if objects.object_of(&decl.return_type) != Some(c_type.as_str()) {
                anyhow::bail!(
                    "object `{c_type}`: constructor `{ctor}` returns `{}`, expected `{c_type}*`",
                    decl.return_type
                );
            }
            out.consumed.insert(ctor.clone());
        }
        if !spec.destructor.is_empty() {
            if !by_name.contains_key(spec.destructor.as_str()) {
                anyhow::bail!(
                    "object `{c_type}`: destructor `{}` not found in the catalogue",
                    spec.destructor
                );
            }
            out.consumed.insert(spec.destructor.clone());
        }
    }

    for (c_type, spec) in &objects.objects {
        out.forward
            .push_str(&format!("class {};\n", mapper.class_name(c_type)));
        let builder = ClassBuilder {
            c_type,
            class: mapper.class_name(c_type),
            spec,
            mapper,
            api,
        };
        builder.emit(declarations, &by_name, &mut out);
    }

    Ok(out)
}

struct ClassBuilder<'a> {
    c_type: &'a str,
    class: String,
    spec: &'a ObjectSpec,
    mapper: &'a TypeMapper<'a>,
    api: &'a ApiConfig,
}

impl ClassBuilder<'_> {
    fn emit(
        &self,
        declarations: &[Declaration],
        by_name: &HashMap<&str, &Declaration>,
        out: &mut ObjectClasses,
    ) {
        let c_type = self.c_type;
        let class = &self.class;
        let cache = format!("InstanceCache<{c_type}, {class}>");
        let mut members = String::new();
        let mut spliced = HashSet::new();

        // Factories.
        for ctor in &self.spec.constructors {
            if self.splice(ctor, &mut members, &mut spliced) {
                continue;
            }
            if let Some(decl) = by_name.get(ctor.as_str()) {
                self.emit_member(decl, true, &mut members, &mut out.definitions);
            }
        }
        if !self.spec.constructors.is_empty() {
            members.push('\n');
        }

        // Instance methods, in catalogue order.
        let receiver = TypeExpr::new(c_type).pointer();
        let mut methods = 0;
        for decl in declarations {
            if out.consumed.contains(&decl.name) {
                continue;
            }
            let takes_receiver = decl.visible_params().first().is_some_and(|p| p.ty == receiver);
            if !takes_receiver {
                continue;
            }
            out.consumed.insert(decl.name.clone());
            methods += 1;
            if self.splice(&decl.name, &mut members, &mut spliced) {
                continue;
            }
            self.emit_member(decl, false, &mut members, &mut out.definitions);
        }

        // Overrides that did not replace a generated member still belong to
        // the class.
        for name in self.spec.overrides.keys() {
            if !spliced.contains(name.as_str()) {
                self.splice(name, &mut members, &mut spliced);
                out.consumed.insert(name.clone());
            }
        }

        let destructor = if self.spec.destructor.is_empty() {
            format!("~{class}() {{ instances().forget(_ptr); }}")
        } else {
            format!(
                "~{class}() {{ instances().forget(_ptr); if (_owned) {}(_ptr); }}",
                self.spec.destructor
            )
        };

        out.classes.push_str(&format!(
            "\
class {class}
{{
    friend class {cache};

    {c_type}* _ptr;
    bool _owned;

    {class}({c_type}* ptr, bool owned) : _ptr(ptr), _owned(owned) {{ }}

public:
    {class}(const {class}&) = delete;
    {class}& operator=(const {class}&) = delete;
    {destructor}

    static {cache}& instances()
    {{
        static {cache} cache;
        return cache;
    }}

    static std::shared_ptr<{class}> wrap({c_type}* ptr, bool owned = true) {{ return instances().lookup(ptr, owned); }}

{members}
    {c_type}* get() const {{ return _ptr; }}
}};

"
        ));

        debug!(
            class = %class,
            factories = self.spec.constructors.len(),
            methods,
            "emitted object class"
        );
    }

    /// Splice the literal override for `name`, if any.
    fn splice<'n>(&self, name: &'n str, members: &mut String, spliced: &mut HashSet<&'n str>) -> bool {
        let Some(literal) = self.spec.overrides.get(name) else {
            return false;
        };
        for line in literal.lines() {
            members.push_str(&format!("    {line}\n"));
        }
        spliced.insert(name);
        true
    }

    /// Declare a factory or method in the class body and define it after the
    /// class.
    fn emit_member(&self, decl: &Declaration, factory: bool, members: &mut String, definitions: &mut String) {
        let name = self.member_name(&decl.name);
        let callee = format!("raw::{}", self.api.short_name(&decl.name));
        let site = CallSite {
            callee: &callee,
            receiver: if factory { None } else { Some("_ptr") },
            owns_result: factory,
        };
        let ret = self.mapper.wrapper_return(decl);
        let params = shape::signature_params(self.mapper, decl, &site);
        let body = shape::render_body(
            self.mapper,
            decl,
            &site,
            "    ",
            self.api.list_release.as_deref(),
        );

        let storage = if factory { "static " } else { "" };
        members.push_str(&format!("    {storage}{ret} {name}({params});\n"));
        definitions.push_str(&format!(
            "inline {ret} {}::{name}({params})\n{{\n{body}}}\n\n",
            self.class
        ));
    }

    /// Apply the rename rules; fall back to the unprefixed C name when they
    /// leave nothing usable.
    fn member_name(&self, decl_name: &str) -> String {
        let mut name = decl_name.to_string();
        for pattern in &self.spec.rename {
            name = name.replace(pattern.as_str(), "");
        }
        let usable = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && !RESERVED_MEMBERS.contains(&name.as_str());
        if usable {
            name
        } else {
            self.api.short_name(decl_name).to_string()
        }
    }
}
