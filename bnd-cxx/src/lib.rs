//! bnd-cxx — C declaration catalogue → object-oriented C++ wrapper header.
//!
//! Reads a catalogue of C function declarations plus hand-written metadata
//! (which integer types are bitmask flags, which pointer types are owned
//! objects) and emits a single header with enums, raw passthroughs that turn
//! error sentinels into exceptions, one RAII class per object type, and free
//! wrapper functions.
//!
//! # Quick start
//!
//! Generate the header from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML and its JSON inputs, writes the header.
//! bnd_cxx::run(Path::new("bnd-cxx.toml"), None).unwrap();
//! ```
//!
//! Or get the text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let header = bnd_cxx::generate(Path::new("bnd-cxx.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::info;

pub mod classify;
pub mod config;
pub mod emit;
pub mod enums;
pub mod extract;
pub mod model;
pub mod object;
pub mod shape;
pub mod typemap;

/// Run the full pipeline: load config and inputs, classify, emit, and write
/// the output file.
///
/// `config_path` is the path to a `bnd-cxx.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Nothing is written unless the whole run succeeds.
///
/// Returns the path the header was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let header = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&output_path, &header)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = header.len(),
        "wrote header"
    );

    Ok(output_path)
}

/// Parse a `bnd-cxx.toml` config file, load its inputs and return the
/// generated header without writing to disk.
pub fn generate(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate the header from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which input documents and header
/// files are resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<String> {
    let inputs = config::Inputs::load(&cfg.input, base_dir, &cfg.include_paths)?;
    info!(
        declarations = inputs.catalogue.len(),
        macros = inputs.macros.len(),
        flags = inputs.flags.len(),
        objects = inputs.objects.objects.len(),
        "loaded inputs"
    );

    let sources = classify::Sources::new(base_dir, &cfg.include_paths);
    generate_from_inputs(&inputs, &cfg.api, &cfg.output, &cfg.conventions, sources)
}

/// Generate the header from in-memory inputs.
///
/// `sources` supplies the header text the classifier scans for error
/// documentation.
pub fn generate_from_inputs(
    inputs: &config::Inputs,
    api: &config::ApiConfig,
    output: &config::OutputConfig,
    conventions: &IndexMap<String, config::ConventionOverride>,
    sources: classify::Sources,
) -> Result<String> {
    let declarations =
        extract::extract_declarations(&inputs.catalogue, api, &inputs.flags, &output.namespace)?;

    let mut classifier = classify::Classifier::new(api, &inputs.objects, conventions, sources);
    let declarations = classifier.classify_all(declarations)?;
    info!(
        declarations = declarations.len(),
        signals_error = declarations.iter().filter(|d| d.signals_error).count(),
        "classified declarations"
    );

    let header = emit::emit_header(
        &declarations,
        &inputs.macros,
        &inputs.flags,
        &inputs.objects,
        api,
        output,
    )?;

    info!(size = header.len(), "generated header");

    Ok(header)
}
