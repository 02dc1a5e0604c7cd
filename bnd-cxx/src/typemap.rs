//! Type mapper — raw C types → wrapper C++ types, and the matching call-site
//! and return-site projections.
//!
//! `map_type` decides what a wrapper signature says; `map_argument` and
//! `map_return` turn wrapper values back into what the raw call expects and
//! raw results into wrapper values.  The two sides must agree: feeding
//! `map_argument` a parameter of type `map_type(T, Param)` yields an
//! expression of type `T`.

use crate::config::{ApiConfig, OutputConfig};
use crate::extract::is_flag_enum;
use crate::model::*;

/// Geometry structs passed by reference and filled by out-parameter shapes.
pub const GEOMETRY: [&str; 4] = ["Point", "FPoint", "Rect", "FRect"];

/// Where a type appears in a wrapper signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Param,
    Return,
}

pub struct TypeMapper<'a> {
    objects: &'a ObjectRegistry,
    prefix: &'a str,
    namespace: &'a str,
}

impl<'a> TypeMapper<'a> {
    pub fn new(objects: &'a ObjectRegistry, api: &'a ApiConfig, output: &'a OutputConfig) -> Self {
        Self {
            objects,
            prefix: &api.prefix,
            namespace: &output.namespace,
        }
    }

    pub fn namespace(&self) -> &str {
        self.namespace
    }

    /// Wrapper class name of a registered object type (`SDL_Window` → `Window`).
    pub fn class_name(&self, c_type: &str) -> String {
        c_type
            .strip_prefix(self.prefix)
            .unwrap_or(c_type)
            .to_string()
    }

    /// `std::shared_ptr<SDL::Window>` for `SDL_Window`.
    pub fn handle_type(&self, c_type: &str) -> String {
        format!(
            "std::shared_ptr<{}::{}>",
            self.namespace,
            self.class_name(c_type)
        )
    }

    /// If `ty` points at one of the geometry structs, its short name.
    fn geometry_of(&self, ty: &TypeExpr) -> Option<&'static str> {
        let pointee = ty.pointee()?;
        let name = pointee.unqualified();
        let short = name.as_str().strip_prefix(self.prefix)?;
        GEOMETRY.iter().copied().find(|g| *g == short)
    }

    fn is_text(ty: &TypeExpr) -> bool {
        ty.as_str() == "const char*"
    }

    /// Wrapper type for `ty`.  `as_list` wraps the mapped element type in a
    /// vector.
    pub fn map_type(&self, ty: &TypeExpr, position: Position, as_list: bool) -> String {
        let mapped = self.map_element(ty, position);
        if as_list {
            format!("std::vector<{mapped}>")
        } else {
            mapped
        }
    }

    fn map_element(&self, ty: &TypeExpr, position: Position) -> String {
        if let Some(object) = self.objects.object_of(ty) {
            return self.handle_type(object);
        }
        if Self::is_text(ty) {
            return match position {
                Position::Return => "std::string".to_string(),
                Position::Param => "const std::string&".to_string(),
            };
        }
        // Returned geometry pointers may be null, so only parameters become
        // references.
        if position == Position::Param
            && let Some(geometry) = self.geometry_of(ty)
        {
            let value = TypeExpr::new(&format!("{}::{geometry}", self.namespace));
            let value = if ty.is_const_pointer() {
                value.with_qualifier("const")
            } else {
                value
            };
            return format!("{value}&");
        }
        ty.to_string()
    }

    /// `type name` for a wrapper parameter list.
    pub fn map_param(&self, param: &Param) -> String {
        format!(
            "{} {}",
            self.map_type(&param.ty, Position::Param, false),
            param.name
        )
    }

    /// Expression passing a wrapper parameter to the raw call.
    pub fn map_argument(&self, param: &Param) -> String {
        let name = &param.name;
        if self.objects.object_of(&param.ty).is_some() {
            format!("{}::unwrap({name})", self.namespace)
        } else if Self::is_text(&param.ty) {
            format!("{name}.c_str()")
        } else if self.geometry_of(&param.ty).is_some() {
            format!("&{name}")
        } else {
            name.clone()
        }
    }

    /// Expression turning a raw result of type `ty` into a wrapper value.
    ///
    /// Only a factory result is `owned`; every other handle is wrapped as
    /// borrowed so dropping it never destroys the object.
    pub fn map_return(&self, ty: &TypeExpr, expr: &str, owned: bool) -> String {
        if let Some(object) = self.objects.object_of(ty) {
            let class = self.class_name(object);
            if owned {
                format!("{}::{class}::wrap({expr})", self.namespace)
            } else {
                format!("{}::{class}::wrap({expr}, false)", self.namespace)
            }
        } else if Self::is_text(ty) {
            format!("{}::text({expr})", self.namespace)
        } else {
            expr.to_string()
        }
    }

    /// The type a wrapper returns for a classified declaration.
    pub fn wrapper_return(&self, decl: &Declaration) -> String {
        match decl.shape {
            Shape::Plain => self.map_type(&decl.return_type, Position::Return, false),
            Shape::ListProducing => {
                let element = list_element(decl);
                self.map_type(&element, Position::Return, true)
            }
            Shape::ObjectOutParam => {
                let out = out_pointee(decl);
                self.map_type(&out, Position::Return, false)
            }
            Shape::PointOut => format!("{}::Point", self.namespace),
            Shape::RectOut => format!("{}::Rect", self.namespace),
            Shape::FPointOut => format!("{}::FPoint", self.namespace),
            Shape::FRectOut => format!("{}::FRect", self.namespace),
        }
    }

    /// Whether the raw layer must cast a C integer result back to its enum.
    pub fn needs_enum_cast(&self, ty: &TypeExpr) -> bool {
        !ty.is_pointer() && is_flag_enum(ty, self.namespace)
    }
}

/// Element type of the array a list-producing call returns.
///
/// `char*` elements are read as text so each string is copied out before the
/// array is released.
pub fn list_element(decl: &Declaration) -> TypeExpr {
    let element = decl
        .return_type
        .pointee()
        .unwrap_or_else(|| decl.return_type.clone());
    if element.as_str() == "char*" {
        TypeExpr::new("const char*")
    } else {
        element
    }
}

/// Value type written through the single out-pointer of
/// [`Shape::ObjectOutParam`].
pub fn out_pointee(decl: &Declaration) -> TypeExpr {
    decl.out_params()
        .last()
        .and_then(|p| p.ty.pointee())
        .map(|p| p.unqualified())
        .unwrap_or_else(|| TypeExpr::new("void"))
}
