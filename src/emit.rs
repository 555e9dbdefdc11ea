//! Build-time generation of standalone entry points
//!
//! Each descriptor becomes a `<module>.rs` program plus a copy of its JSON, which the program
//! embeds. The programs are thin wrappers around [entry::main_from_json](crate::entry::main_from_json).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::descriptor::load::DescriptorLoader;
use crate::descriptor::ModuleDescriptor;

/// Rendering context for an entry point
#[derive(Serialize)]
struct EntryPointContext {
    module: String,
    executable: String,
    descriptor_file: String,
}

/// One generated program
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEntry {
    pub module: String,
    pub source: PathBuf,
    pub descriptor: PathBuf,
}

/// `[[bin]]` manifest entry for the generated program
impl fmt::Display for EmittedEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "[[bin]]")?;
        writeln!(f, "name = \"{}\"", self.module)?;
        write!(f, "path = \"{}\"", self.source.display())
    }
}

/// Render the `main` source for one descriptor using TinyTemplate
pub fn render_entry_point(descriptor: &ModuleDescriptor, descriptor_file: &Path) -> Result<String, tinytemplate::error::Error> {
    /// included entry point template
    static ENTRY_POINT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/entry_point.txt"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("entry_point", ENTRY_POINT)?;

    let context = EntryPointContext {
        module: descriptor.name().to_string(),
        executable: descriptor.executable().to_string(),
        descriptor_file: descriptor_file.display().to_string(),
    };

    tt.render("entry_point", &context)
}

/// Emit one program per descriptor found in `descriptor_dir`
///
/// Every descriptor is loaded (and so validated) before anything is written.
pub fn emit_all(descriptor_dir: &Path, out_dir: &Path) -> anyhow::Result<Vec<EmittedEntry>> {
    let loader = DescriptorLoader::new()?;
    let descriptors = loader
        .read_dir(descriptor_dir)
        .with_context(|| format!("Loading descriptors from {}", descriptor_dir.display()))?;

    fs::create_dir_all(out_dir).with_context(|| format!("Creating {}", out_dir.display()))?;

    descriptors
        .iter()
        .map(|(path, descriptor)| emit(path, descriptor, out_dir))
        .collect()
}

/// Write `<module>.rs` and `<module>.json` into `out_dir`
pub fn emit(descriptor_file: &Path, descriptor: &ModuleDescriptor, out_dir: &Path) -> anyhow::Result<EmittedEntry> {
    let source = out_dir.join(format!("{}.rs", descriptor.name()));
    let json = out_dir.join(format!("{}.json", descriptor.name()));

    let rendered = render_entry_point(descriptor, descriptor_file)
        .with_context(|| format!("Rendering entry point for {}", descriptor.name()))?;
    fs::write(&source, rendered).with_context(|| format!("Writing {}", source.display()))?;
    fs::copy(descriptor_file, &json)
        .with_context(|| format!("Copying {} to {}", descriptor_file.display(), json.display()))?;

    info!("Emitted {} entry point at {}", descriptor.name(), source.display());
    Ok(EmittedEntry {
        module: descriptor.name().to_string(),
        source,
        descriptor: json,
    })
}
