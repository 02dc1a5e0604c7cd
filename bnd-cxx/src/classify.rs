//! Declaration classifier — decides whether a declaration signals errors
//! through a sentinel and which calling-convention [`Shape`] it has.
//!
//! Error signaling is read off the doc comment above the declaration in its
//! header; shapes are inferred from the trailing parameters.  Both can be
//! pinned per declaration through the `[conventions]` table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::{self, ApiConfig, ConventionOverride};
use crate::model::*;

/// Line that must sit directly above every declaration: the end of its doc
/// comment.
const COMMENT_CLOSE: &str = " */";
const COMMENT_OPEN: &str = "/**";

// ---------------------------------------------------------------------------
// Header text
// ---------------------------------------------------------------------------

/// Header files read by the classifier, split into lines and cached per path.
#[derive(Debug, Default)]
pub struct Sources {
    base_dir: PathBuf,
    include_paths: Vec<PathBuf>,
    files: HashMap<PathBuf, Vec<String>>,
}

impl Sources {
    pub fn new(base_dir: &Path, include_paths: &[PathBuf]) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            include_paths: include_paths.to_vec(),
            files: HashMap::new(),
        }
    }

    /// Register in-memory text for `path`, bypassing the filesystem.
    pub fn insert(&mut self, path: impl Into<PathBuf>, text: &str) {
        self.files
            .insert(path.into(), text.lines().map(String::from).collect());
    }

    /// Lines of the header a catalogue entry points at.
    pub fn lines(&mut self, path: &Path) -> Result<&[String]> {
        if !self.files.contains_key(path) {
            let resolved = config::resolve_path(path, &self.base_dir, &self.include_paths);
            let text = std::fs::read_to_string(&resolved)
                .with_context(|| format!("reading header {}", resolved.display()))?;
            trace!(path = %resolved.display(), "loaded header");
            self.files
                .insert(path.to_path_buf(), text.lines().map(String::from).collect());
        }
        Ok(&self.files[path])
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub struct Classifier<'a> {
    api: &'a ApiConfig,
    objects: &'a ObjectRegistry,
    conventions: &'a IndexMap<String, ConventionOverride>,
    sources: Sources,
}

impl<'a> Classifier<'a> {
    pub fn new(
        api: &'a ApiConfig,
        objects: &'a ObjectRegistry,
        conventions: &'a IndexMap<String, ConventionOverride>,
        sources: Sources,
    ) -> Self {
        Self {
            api,
            objects,
            conventions,
            sources,
        }
    }

    /// Classify every declaration in order.  The first failure aborts.
    pub fn classify_all(&mut self, declarations: Vec<Declaration>) -> Result<Vec<Declaration>> {
        declarations
            .into_iter()
            .map(|decl| {
                let location = format!("{}:{}: `{}`", decl.file.display(), decl.line, decl.name);
                self.classify(decl).context(location)
            })
            .collect()
    }

    /// Annotate one declaration with `signals_error` and `shape`.
    ///
    /// Narrows a `bool` sentinel return to `void` and moves a trailing
    /// `count` pointer out of the declared parameters.
    pub fn classify(&mut self, mut decl: Declaration) -> Result<Declaration> {
        let pinned = self
            .conventions
            .get(&decl.name)
            .copied()
            .unwrap_or_default();

        let signals_error = match pinned.signals_error {
            Some(v) => v,
            None => self.scan_error(&decl)?,
        };
        if signals_error {
            match decl.return_type.as_str() {
                "void" => anyhow::bail!(
                    "documented to set {}() but returns void, so there is no sentinel to check",
                    self.api.error_accessor
                ),
                "bool" => decl.return_type = TypeExpr::new("void"),
                _ => {}
            }
        }
        decl.signals_error = signals_error;

        let shape = match pinned.shape {
            Some(shape) => shape,
            None => self.infer_shape(&decl),
        };
        if shape == Shape::ListProducing {
            match decl.params.last() {
                Some(p) if p.ty.is_pointer() => decl.count = decl.params.pop(),
                _ => anyhow::bail!("list-producing call needs a trailing count pointer"),
            }
            // `const` arrays belong to the library.
            let borrowed = decl
                .return_type
                .as_str()
                .split_whitespace()
                .any(|t| t == "const");
            decl.release_list = pinned.release_list.unwrap_or(!borrowed);
        }
        if shape.hidden_params() > decl.params.len() {
            anyhow::bail!(
                "{shape:?} needs {} trailing out-parameters, found {}",
                shape.hidden_params(),
                decl.params.len()
            );
        }
        decl.shape = shape;
        if let Some(p) = decl.out_params().iter().find(|p| !is_out_pointer(&p.ty)) {
            anyhow::bail!(
                "{shape:?} out-parameter `{}` must be a non-const pointer, found `{}`",
                p.name,
                p.ty
            );
        }

        debug!(
            name = %decl.name,
            shape = ?decl.shape,
            signals_error = decl.signals_error,
            "classified function"
        );
        Ok(decl)
    }

    /// Walk the doc comment above the declaration looking for a mention of the
    /// last-error accessor.
    fn scan_error(&mut self, decl: &Declaration) -> Result<bool> {
        let api = self.api;
        if api.never_error.iter().any(|n| *n == decl.name)
            || api.never_error_suffixes.iter().any(|s| decl.name.ends_with(s.as_str()))
        {
            return Ok(false);
        }
        let marker = format!("{}()", api.error_accessor);

        let lines = self.sources.lines(&decl.file)?;
        // `line` is 1-based; the comment close sits on the line before it.
        let close = decl
            .line
            .checked_sub(2)
            .filter(|&i| lines.get(i).is_some_and(|l| l == COMMENT_CLOSE));
        let Some(close) = close else {
            anyhow::bail!("expected `{COMMENT_CLOSE}` on the line above the declaration");
        };

        for text in lines[..close].iter().rev() {
            if text.contains(COMMENT_OPEN) {
                return Ok(false);
            }
            if text.contains(&marker) {
                return Ok(true);
            }
        }
        anyhow::bail!("doc comment above the declaration has no `{COMMENT_OPEN}` opener")
    }

    /// Infer the shape from trailing parameters.  Rules are tried in a fixed
    /// order and the first match wins.
    fn infer_shape(&self, decl: &Declaration) -> Shape {
        if is_list_producing(decl) {
            return Shape::ListProducing;
        }
        let is_getter = self
            .api
            .short_name(&decl.name)
            .starts_with(self.api.getter_prefix.as_str());
        if !is_getter || !decl.return_type.is_void() {
            return Shape::Plain;
        }

        let params = &decl.params;
        if trailing_all(params, 4, "float*") {
            Shape::FRectOut
        } else if trailing_all(params, 4, "int*") {
            Shape::RectOut
        } else if trailing_all(params, 2, "float*") {
            Shape::FPointOut
        } else if trailing_all(params, 2, "int*") {
            Shape::PointOut
        } else if self.is_object_out_param(params) {
            Shape::ObjectOutParam
        } else {
            Shape::Plain
        }
    }

    fn is_object_out_param(&self, params: &[Param]) -> bool {
        let Some((last, earlier)) = params.split_last() else {
            return false;
        };
        let Some(pointee) = last.ty.pointee() else {
            return false;
        };
        if last.ty.is_const_pointer() {
            return false;
        }
        // `SDL_Window** out`: the callee hands back an object.
        if self.objects.object_of(&pointee).is_some() {
            return true;
        }
        let plain = pointee.unqualified();
        if plain.is_void() || plain.as_str() == "char" || self.objects.contains(plain.as_str()) {
            return false;
        }
        // Everything before the out-pointer is by value, except a leading
        // object receiver.
        earlier.iter().enumerate().all(|(i, p)| {
            !p.ty.is_pointer() || (i == 0 && self.objects.object_of(&p.ty).is_some())
        })
    }
}

/// Trailing `int* count` with a pointer result.
fn is_list_producing(decl: &Declaration) -> bool {
    let Some(last) = decl.params.last() else {
        return false;
    };
    last.name == "count"
        && last.ty.as_str() == "int*"
        && decl
            .return_type
            .pointee()
            .is_some_and(|elem| !elem.unqualified().is_void())
}

fn trailing_all(params: &[Param], n: usize, ty: &str) -> bool {
    params.len() >= n && params[params.len() - n..].iter().all(|p| p.ty.as_str() == ty)
}

/// A pointer the callee can write a value through.
fn is_out_pointer(ty: &TypeExpr) -> bool {
    !ty.is_const_pointer()
        && ty
            .pointee()
            .is_some_and(|p| !p.unqualified().is_void())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\
/**
 * Create a window.
 *
 * \\returns the window or NULL on failure; call SDL_GetError() for more
 *          information.
 */
extern SDL_Window * SDL_CreateWindow(const char *title, int w, int h);

/**
 * Get the size of a window.
 */
extern void SDL_GetWindowSize(SDL_Window *window, int *w, int *h);
// not a doc comment
extern void SDL_Broken(void);
";

    fn decl(name: &str, ret: &str, line: usize, params: &[(&str, &str)]) -> Declaration {
        Declaration {
            name: name.to_string(),
            return_type: ret.into(),
            params: params.iter().map(|(t, n)| Param::new(*t, n)).collect(),
            count: None,
            file: "SDL_video.h".into(),
            line,
            signals_error: false,
            release_list: false,
            shape: Shape::Plain,
        }
    }

    fn objects() -> ObjectRegistry {
        let mut objects = ObjectRegistry::default();
        objects
            .objects
            .insert("SDL_Window".into(), ObjectSpec::default());
        objects
    }

    fn run(d: Declaration) -> Result<Declaration> {
        let api = ApiConfig::default();
        let objects = objects();
        let conventions = IndexMap::new();
        let mut sources = Sources::default();
        sources.insert("SDL_video.h", HEADER);
        Classifier::new(&api, &objects, &conventions, sources).classify(d)
    }

    #[test]
    fn error_mention_in_doc_comment() {
        let d = run(decl(
            "SDL_CreateWindow",
            "SDL_Window*",
            7,
            &[("const char*", "title"), ("int", "w"), ("int", "h")],
        ))
        .unwrap();
        assert!(d.signals_error);
        assert_eq!(d.shape, Shape::Plain);
    }

    #[test]
    fn opener_reached_first_means_no_error() {
        let d = run(decl(
            "SDL_GetWindowSize",
            "void",
            12,
            &[("SDL_Window*", "window"), ("int*", "w"), ("int*", "h")],
        ))
        .unwrap();
        assert!(!d.signals_error);
        assert_eq!(d.shape, Shape::PointOut);
        assert_eq!(d.visible_params().len(), 1);
        assert_eq!(d.out_params().len(), 2);
    }

    #[test]
    fn missing_comment_close_is_fatal() {
        let err = run(decl("SDL_Broken", "void", 14, &[])).unwrap_err();
        assert!(format!("{err:#}").contains("*/"), "{err:#}");
    }

    #[test]
    fn denylisted_names_skip_the_scan() {
        // Line 14 has no comment above it, so a scan would fail.
        let d = run(decl("SDL_Swap32", "Uint32", 14, &[("Uint32", "x")])).unwrap();
        assert!(!d.signals_error);
        let d = run(decl("SDL_memcpy_builtin", "void*", 14, &[])).unwrap();
        assert!(!d.signals_error);
    }

    #[test]
    fn bool_sentinel_is_narrowed() {
        let mut header = Sources::default();
        header.insert(
            "SDL_init.h",
            "/**\n * \\returns true on success; call SDL_GetError() for details.\n */\nextern bool SDL_Init(SDL_InitFlags flags);\n",
        );
        let api = ApiConfig::default();
        let objects = objects();
        let conventions = IndexMap::new();
        let mut d = decl("SDL_Init", "bool", 4, &[("Uint32", "flags")]);
        d.file = "SDL_init.h".into();
        let d = Classifier::new(&api, &objects, &conventions, header)
            .classify(d)
            .unwrap();
        assert!(d.signals_error);
        assert!(d.return_type.is_void());
    }

    #[test]
    fn classification_is_idempotent() {
        let d = decl(
            "SDL_GetWindowSize",
            "void",
            12,
            &[("SDL_Window*", "window"), ("int*", "w"), ("int*", "h")],
        );
        let once = run(d.clone()).unwrap();
        let twice = run(d).unwrap();
        assert_eq!(once.shape, twice.shape);
        assert_eq!(once.signals_error, twice.signals_error);
    }

    fn shape_of(name: &str, ret: &str, params: &[(&str, &str)]) -> Shape {
        let mut conventions = IndexMap::new();
        conventions.insert(
            name.to_string(),
            ConventionOverride {
                shape: None,
                signals_error: Some(false),
                release_list: None,
            },
        );
        let api = ApiConfig::default();
        let objects = objects();
        Classifier::new(&api, &objects, &conventions, Sources::default())
            .classify(decl(name, ret, 1, params))
            .unwrap()
            .shape
    }

    #[test]
    fn trailing_count_is_list_producing() {
        assert_eq!(
            shape_of("SDL_GetDisplays", "SDL_DisplayID*", &[("int*", "count")]),
            Shape::ListProducing
        );
        // Same pointer, different name: not a count.
        assert_eq!(
            shape_of("SDL_GetThings", "int*", &[("int*", "n")]),
            Shape::Plain
        );
        // No array comes back, so there is nothing to count.
        assert_eq!(
            shape_of("SDL_CountThings", "void", &[("int*", "count")]),
            Shape::Plain
        );
    }

    #[test]
    fn count_moves_to_raw_layer_only() {
        let mut conventions = IndexMap::new();
        conventions.insert(
            "SDL_GetDisplays".to_string(),
            ConventionOverride {
                shape: None,
                signals_error: Some(true),
                release_list: None,
            },
        );
        let api = ApiConfig::default();
        let objects = objects();
        let d = Classifier::new(&api, &objects, &conventions, Sources::default())
            .classify(decl("SDL_GetDisplays", "SDL_DisplayID*", 1, &[("int*", "count")]))
            .unwrap();
        assert_eq!(d.shape, Shape::ListProducing);
        assert!(d.params.is_empty());
        assert_eq!(d.raw_params(), vec![Param::new("int*", "count")]);
        // Pointer results keep their type; only bool sentinels are narrowed.
        assert_eq!(d.return_type.as_str(), "SDL_DisplayID*");
    }

    #[test]
    fn out_parameter_priority() {
        let f4 = [
            ("SDL_Window*", "window"),
            ("float*", "x"),
            ("float*", "y"),
            ("float*", "w"),
            ("float*", "h"),
        ];
        assert_eq!(shape_of("SDL_GetFRect", "void", &f4), Shape::FRectOut);
        let i4 = [
            ("int*", "top"),
            ("int*", "left"),
            ("int*", "bottom"),
            ("int*", "right"),
        ];
        // Four ints win over two ints, even when they are not a rect.
        assert_eq!(shape_of("SDL_GetWindowBordersSize", "void", &i4), Shape::RectOut);
        assert_eq!(
            shape_of("SDL_GetMouseState", "void", &[("float*", "x"), ("float*", "y")]),
            Shape::FPointOut
        );
        // Only getters get out-parameter shapes.
        assert_eq!(
            shape_of("SDL_SetSize", "void", &[("int*", "w"), ("int*", "h")]),
            Shape::Plain
        );
        // A non-void result means the pointers are not outputs.
        assert_eq!(
            shape_of("SDL_GetSize", "int", &[("int*", "w"), ("int*", "h")]),
            Shape::Plain
        );
    }

    #[test]
    fn object_out_param() {
        assert_eq!(
            shape_of(
                "SDL_GetDisplayBounds",
                "void",
                &[("SDL_DisplayID", "id"), ("SDL_Rect*", "rect")]
            ),
            Shape::ObjectOutParam
        );
        assert_eq!(
            shape_of(
                "SDL_GetWindowSafeArea",
                "void",
                &[("SDL_Window*", "window"), ("SDL_Rect*", "rect")]
            ),
            Shape::ObjectOutParam
        );
        assert_eq!(
            shape_of(
                "SDL_GetParentWindow",
                "void",
                &[("const char*", "name"), ("SDL_Window**", "out")]
            ),
            Shape::ObjectOutParam
        );
        // An earlier non-receiver pointer rules it out.
        assert_eq!(
            shape_of(
                "SDL_GetThing",
                "void",
                &[("const char*", "name"), ("SDL_Rect*", "rect")]
            ),
            Shape::Plain
        );
        // Const pointers are inputs.
        assert_eq!(
            shape_of("SDL_GetThing", "void", &[("const SDL_Rect*", "rect")]),
            Shape::Plain
        );
        // The receiver itself is never an out-parameter.
        assert_eq!(
            shape_of("SDL_GetThing", "void", &[("SDL_Window*", "window")]),
            Shape::Plain
        );
    }

    #[test]
    fn pinned_shape_wins() {
        let mut conventions = IndexMap::new();
        conventions.insert(
            "SDL_GetWindowBordersSize".to_string(),
            ConventionOverride {
                shape: Some(Shape::Plain),
                signals_error: Some(true),
                release_list: None,
            },
        );
        let api = ApiConfig::default();
        let objects = objects();
        let d = Classifier::new(&api, &objects, &conventions, Sources::default())
            .classify(decl(
                "SDL_GetWindowBordersSize",
                "bool",
                1,
                &[
                    ("SDL_Window*", "window"),
                    ("int*", "top"),
                    ("int*", "left"),
                    ("int*", "bottom"),
                    ("int*", "right"),
                ],
            ))
            .unwrap();
        assert_eq!(d.shape, Shape::Plain);
        assert!(d.signals_error);
        assert!(d.return_type.is_void());
    }

    #[test]
    fn error_signaling_void_is_fatal() {
        let mut conventions = IndexMap::new();
        conventions.insert(
            "SDL_Quit".to_string(),
            ConventionOverride {
                shape: None,
                signals_error: Some(true),
                release_list: None,
            },
        );
        let api = ApiConfig::default();
        let objects = objects();
        let err = Classifier::new(&api, &objects, &conventions, Sources::default())
            .classify(decl("SDL_Quit", "void", 1, &[]))
            .unwrap_err();
        assert!(err.to_string().contains("void"));
    }

    fn classify_pinned(
        pinned: ConventionOverride,
        name: &str,
        ret: &str,
        params: &[(&str, &str)],
    ) -> Result<Declaration> {
        let mut conventions = IndexMap::new();
        conventions.insert(name.to_string(), pinned);
        let api = ApiConfig::default();
        let objects = objects();
        Classifier::new(&api, &objects, &conventions, Sources::default())
            .classify(decl(name, ret, 1, params))
    }

    #[test]
    fn pinned_object_out_param_needs_a_writable_pointer() {
        let pinned = ConventionOverride {
            shape: Some(Shape::ObjectOutParam),
            signals_error: Some(false),
            release_list: None,
        };
        let err = classify_pinned(
            pinned,
            "SDL_GetThing",
            "void",
            &[("SDL_Window*", "window"), ("int", "value")],
        )
        .unwrap_err();
        let err = format!("{err:#}");
        assert!(err.contains("`value`"), "{err}");
        assert!(err.contains("`int`"), "{err}");

        let err = classify_pinned(pinned, "SDL_GetThing", "void", &[("const SDL_Rect*", "rect")])
            .unwrap_err();
        assert!(format!("{err:#}").contains("non-const pointer"), "{err:#}");

        let err = classify_pinned(pinned, "SDL_GetThing", "void", &[("void*", "data")]).unwrap_err();
        assert!(format!("{err:#}").contains("`void*`"), "{err:#}");

        let d = classify_pinned(pinned, "SDL_GetThing", "void", &[("SDL_Window**", "out")])
            .unwrap();
        assert_eq!(d.shape, Shape::ObjectOutParam);
    }

    #[test]
    fn pinned_point_out_needs_pointers() {
        let pinned = ConventionOverride {
            shape: Some(Shape::PointOut),
            signals_error: Some(false),
            release_list: None,
        };
        let err = classify_pinned(pinned, "SDL_GetThing", "void", &[("int", "x"), ("int*", "y")])
            .unwrap_err();
        assert!(format!("{err:#}").contains("`x`"), "{err:#}");
    }

    #[test]
    fn const_arrays_are_not_released() {
        let pinned = ConventionOverride {
            shape: None,
            signals_error: Some(false),
            release_list: None,
        };
        let owned =
            classify_pinned(pinned, "SDL_GetDisplays", "SDL_DisplayID*", &[("int*", "count")])
                .unwrap();
        assert_eq!(owned.shape, Shape::ListProducing);
        assert!(owned.release_list);

        let borrowed = classify_pinned(
            pinned,
            "SDL_GetTrayEntries",
            "const SDL_TrayEntry**",
            &[("SDL_Tray*", "tray"), ("int*", "count")],
        )
        .unwrap();
        assert_eq!(borrowed.shape, Shape::ListProducing);
        assert!(!borrowed.release_list);

        // Plain results never carry a release.
        let plain = classify_pinned(pinned, "SDL_GetThings", "int*", &[("int*", "n")]).unwrap();
        assert!(!plain.release_list);
    }

    #[test]
    fn pinned_release_wins() {
        let keep = ConventionOverride {
            shape: None,
            signals_error: Some(false),
            release_list: Some(false),
        };
        let d = classify_pinned(keep, "SDL_GetDisplays", "SDL_DisplayID*", &[("int*", "count")])
            .unwrap();
        assert!(!d.release_list);

        let free = ConventionOverride {
            release_list: Some(true),
            ..keep
        };
        let d = classify_pinned(
            free,
            "SDL_GetTrayEntries",
            "const SDL_TrayEntry**",
            &[("SDL_Tray*", "tray"), ("int*", "count")],
        )
        .unwrap();
        assert!(d.release_list);
    }
}
