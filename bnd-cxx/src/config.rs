//! Configuration types for `bnd-cxx.toml` and loading of the JSON input
//! documents it points at.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::model::{CatalogueEntry, FlagRegistry, FlagSpec, MacroTable, ObjectRegistry, Shape};

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    pub input: InputConfig,
    /// Additional directories to search when resolving input documents and
    /// the header files named by catalogue entries.  Each entry is tried in
    /// order after `base_dir` (the TOML file's parent directory).
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub api: ApiConfig,
    /// Explicit calling conventions keyed by declaration name.  A value given
    /// here replaces what the classifier would infer.
    #[serde(default)]
    pub conventions: IndexMap<String, ConventionOverride>,
}

/// Output file settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output file path (e.g. `SDL++.hpp`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
    /// C++ namespace wrapping everything that is emitted.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Header of the wrapped C library, emitted as `#include <…>`.
    #[serde(default = "default_include")]
    pub include: String,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("wrapper.hpp")
}

fn default_namespace() -> String {
    "SDL".to_string()
}

fn default_include() -> String {
    "SDL3/SDL.h".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
            namespace: default_namespace(),
            include: default_include(),
        }
    }
}

/// Paths of the JSON documents produced by the external collaborators.
#[derive(Debug, Deserialize)]
pub struct InputConfig {
    /// Declaration catalogue (`[{name, return_type, params, file, line}]`).
    pub catalogue: PathBuf,
    /// Macro table (`{NAME: "value"}`).
    pub macros: PathBuf,
    /// Flag registry (`{TypeName: "PREFIX_" | false}`).
    pub flags: PathBuf,
    /// Object registry (`{TypeName: {constructors, destructor, …}}`).
    pub objects: PathBuf,
}

/// Conventions of the wrapped C API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Common prefix of every exported name; stripped for wrapper names.
    pub prefix: String,
    /// Function returning the last error message.
    pub error_accessor: String,
    /// Declarations that never signal errors, whatever their docs say.
    pub never_error: Vec<String>,
    /// Name suffixes that never signal errors (compiler builtins).
    pub never_error_suffixes: Vec<String>,
    /// Unprefixed name prefix that marks getters eligible for out-parameter
    /// shapes.
    pub getter_prefix: String,
    /// Function releasing arrays returned by list-producing calls.
    pub list_release: Option<String>,
    /// Identifier struct that gets an `operator!` emptiness check.
    pub guid_type: Option<String>,
    /// Macro name prefixes never turned into enumerators.
    pub macro_exclude: Vec<String>,
    /// Macros whose value contains one of these are never enumerators.
    pub macro_exclude_values: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "SDL_".to_string(),
            error_accessor: "SDL_GetError".to_string(),
            never_error: ["SDL_GetError", "SDL_Swap16", "SDL_Swap32", "SDL_Swap64"]
                .map(String::from)
                .to_vec(),
            never_error_suffixes: vec!["builtin".to_string()],
            getter_prefix: "Get".to_string(),
            list_release: Some("SDL_free".to_string()),
            guid_type: Some("SDL_GUID".to_string()),
            macro_exclude: Vec::new(),
            macro_exclude_values: vec!["renamed".to_string()],
        }
    }
}

impl ApiConfig {
    /// Strip the library prefix from a C name, if present.
    pub fn short_name<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }
}

/// Explicit convention for one declaration.
///
/// ```toml
/// [conventions]
/// SDL_GetWindowSize = { shape = "point_out", signals_error = true }
/// SDL_GetTrayEntries = { release_list = false }
/// ```
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ConventionOverride {
    pub shape: Option<Shape>,
    pub signals_error: Option<bool>,
    /// Whether the array a list-producing call returns is released after
    /// copying.  Defaults to releasing unless the array type is `const`.
    pub release_list: Option<bool>,
}

/// All parsed input documents.
#[derive(Debug, Default)]
pub struct Inputs {
    pub catalogue: Vec<CatalogueEntry>,
    pub macros: MacroTable,
    pub flags: FlagRegistry,
    pub objects: ObjectRegistry,
}

impl Inputs {
    /// Read and parse every document named in `input`.
    pub fn load(input: &InputConfig, base_dir: &Path, include_paths: &[PathBuf]) -> Result<Self> {
        let catalogue: Vec<CatalogueEntry> = load_json(&resolve_path(
            &input.catalogue,
            base_dir,
            include_paths,
        ))
        .context("loading declaration catalogue")?;
        let macros: MacroTable =
            load_json(&resolve_path(&input.macros, base_dir, include_paths))
                .context("loading macro table")?;
        let flags: FlagRegistry = load_json(&resolve_path(&input.flags, base_dir, include_paths))
            .context("loading flag registry")?;
        let objects: ObjectRegistry =
            load_json(&resolve_path(&input.objects, base_dir, include_paths))
                .context("loading object registry")?;

        validate_flags(&flags)?;

        Ok(Self {
            catalogue,
            macros,
            flags,
            objects,
        })
    }
}

/// A flag entry is either a prefix string or `false`; `true` means nothing.
fn validate_flags(flags: &FlagRegistry) -> Result<()> {
    for (name, spec) in flags {
        if let FlagSpec::Opaque(true) = spec {
            anyhow::bail!("flag type `{name}` must map to a macro prefix or `false`, got `true`");
        }
    }
    Ok(())
}

/// Resolve a path by searching `base_dir` first, then each `include_paths`
/// entry.  Absolute paths are returned as-is.  If the file is not found
/// anywhere, falls back to `base_dir.join(path)` so that the caller gets a
/// meaningful error when opening it.
pub fn resolve_path(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    for inc in include_paths {
        let candidate = base_dir.join(inc).join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    base_dir.join(path)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load and parse a `bnd-cxx.toml` configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[output]

[input]
catalogue = "catalogue.json"
macros = "macros.json"
flags = "flags.json"
objects = "objects.json"
"#;

    #[test]
    fn defaults_follow_sdl() {
        let cfg: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.output.namespace, "SDL");
        assert_eq!(cfg.output.include, "SDL3/SDL.h");
        assert_eq!(cfg.api.prefix, "SDL_");
        assert_eq!(cfg.api.list_release.as_deref(), Some("SDL_free"));
        assert!(cfg.api.never_error.iter().any(|n| n == "SDL_Swap64"));
        assert!(cfg.conventions.is_empty());
        assert_eq!(cfg.api.short_name("SDL_CreateWindow"), "CreateWindow");
        assert_eq!(cfg.api.short_name("memcpy"), "memcpy");
    }

    #[test]
    fn conventions_table() {
        let text = format!(
            "{MINIMAL}\n[conventions]\nSDL_GetWindowSize = {{ shape = \"point_out\", signals_error = true }}\nSDL_Quit = {{ signals_error = false }}\n"
        );
        let cfg: Config = toml::from_str(&text).unwrap();
        let size = cfg.conventions["SDL_GetWindowSize"];
        assert_eq!(size.shape, Some(Shape::PointOut));
        assert_eq!(size.signals_error, Some(true));
        assert_eq!(cfg.conventions["SDL_Quit"].shape, None);
        assert_eq!(cfg.conventions["SDL_Quit"].release_list, None);
    }

    #[test]
    fn conventions_can_keep_a_returned_list() {
        let text = format!(
            "{MINIMAL}\n[conventions]\nSDL_GetTrayEntries = {{ shape = \"list_producing\", release_list = false }}\n"
        );
        let cfg: Config = toml::from_str(&text).unwrap();
        let entries = cfg.conventions["SDL_GetTrayEntries"];
        assert_eq!(entries.shape, Some(Shape::ListProducing));
        assert_eq!(entries.release_list, Some(false));
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let text = format!("{MINIMAL}\n[conventions]\nSDL_Quit = {{ shape = \"triangle_out\" }}\n");
        assert!(toml::from_str::<Config>(&text).is_err());
    }

    #[test]
    fn api_overrides_merge_with_defaults() {
        let text = format!("{MINIMAL}\n[api]\nprefix = \"IMG_\"\nlist_release = \"IMG_free\"\n");
        let cfg: Config = toml::from_str(&text).unwrap();
        assert_eq!(cfg.api.prefix, "IMG_");
        assert_eq!(cfg.api.list_release.as_deref(), Some("IMG_free"));
        assert_eq!(cfg.api.getter_prefix, "Get");
    }

    #[test]
    fn flag_registry_accepts_prefix_or_false() {
        let flags: FlagRegistry =
            serde_json::from_str(r#"{"SDL_InitFlags": "SDL_INIT_", "SDL_Keymod": false}"#).unwrap();
        assert!(validate_flags(&flags).is_ok());
        assert_eq!(flags["SDL_InitFlags"].prefix(), Some("SDL_INIT_"));
        let bad: FlagRegistry = serde_json::from_str(r#"{"SDL_Keymod": true}"#).unwrap();
        assert!(validate_flags(&bad).is_err());
    }
}
