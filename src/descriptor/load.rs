use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

use crate::descriptor::module::ModuleDescriptor;
use crate::error::DescriptorError;

/// Reads descriptor JSON files, validating them against the embedded schema first
pub struct DescriptorLoader {
    compiled_schema: JSONSchema,
}

impl DescriptorLoader {
    pub fn new() -> Result<DescriptorLoader, DescriptorError> {
        /// included descriptor schema
        static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/descriptor.json"));
        let schema_path = PathBuf::from("data/schema/descriptor.json");

        let schema: Value = serde_json::from_str(SCHEMA).map_err(|err| DescriptorError::Load {
            path: schema_path.clone(),
            reason: err.to_string(),
        })?;
        let compiled_schema = JSONSchema::compile(&schema).map_err(|err| DescriptorError::Load {
            path: schema_path,
            reason: err.to_string(),
        })?;

        Ok(DescriptorLoader { compiled_schema })
    }

    /// Read, validate and deserialise one descriptor file
    pub fn read(&self, path: &Path) -> Result<ModuleDescriptor, DescriptorError> {
        let json_string = self.read_file(path)?;
        self.read_str(path, &json_string)
    }

    /// Validate and deserialise descriptor JSON, `path` is only used in error messages
    pub fn read_str(&self, path: &Path, json_string: &str) -> Result<ModuleDescriptor, DescriptorError> {
        let json: Value = self.parse_untyped_json(path, json_string)?;

        match self.validate(path, &json) {
            Ok(_) => {
                info!("Descriptor {} is valid", path.display());
                self.parse_json(path, json)
            }
            Err(err) => {
                warn!("Descriptor {} fails validation", path.display());
                Err(err)
            }
        }
    }

    /// Load every `*.json` descriptor in a directory, sorted by file name
    pub fn read_dir(&self, dir: &Path) -> Result<Vec<(PathBuf, ModuleDescriptor)>, DescriptorError> {
        let paths = get_descriptor_paths(dir).map_err(|err| DescriptorError::Load {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })?;

        paths
            .into_iter()
            .map(|path| self.read(&path).map(|descriptor| (path, descriptor)))
            .collect()
    }

    fn validate(&self, path: &Path, json: &Value) -> Result<(), DescriptorError> {
        info!("Validating descriptor {} against JSON schema", path.display());
        if let Err(errors) = self.compiled_schema.validate(json) {
            let reasons: Vec<String> = errors.map(|err| err.to_string()).collect();
            return Err(DescriptorError::Load {
                path: path.to_path_buf(),
                reason: reasons.join("; "),
            });
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String, DescriptorError> {
        info!("Reading descriptor at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read descriptor at path {}: {}", path.display(), err);
            DescriptorError::Load {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        })
    }

    fn parse_json(&self, path: &Path, value: Value) -> Result<ModuleDescriptor, DescriptorError> {
        // from_value is generic, request ModuleDescriptor specifically so construction checks run
        serde_json::from_value::<ModuleDescriptor>(value).map_err(|err| DescriptorError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    fn parse_untyped_json(&self, path: &Path, json_string: &str) -> Result<Value, DescriptorError> {
        serde_json::from_str::<Value>(json_string).map_err(|err| DescriptorError::Load {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

pub fn get_descriptor_paths(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut paths = fs::read_dir(dir)?
        .map(|res| res.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, io::Error>>()?;
    paths.retain(|path| path.extension().map_or(false, |ext| ext == "json"));
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    static BWA_MEM: &str = r#"{
        "name": "bwa_mem",
        "executable": "{tool_home}/bin/bwa mem",
        "wall_time_days": 2,
        "parameters": [
            {"name": "threads", "type": "integer", "flag": "-t", "order": 0},
            {"name": "reference", "type": "file", "order": 1, "required": true},
            {"name": "reads", "type": {"list": "file"}, "order": 2, "required": true},
            {"name": "alignment", "type": "file", "direction": "output", "redirect": true, "persist_output": true, "mime_type": "text/sam"}
        ]
    }"#;

    #[test]
    fn reads_valid_descriptor() {
        let loader = DescriptorLoader::new().unwrap();
        let module = loader.read_str(Path::new("bwa_mem.json"), BWA_MEM).unwrap();
        assert_eq!(module.name(), "bwa_mem");
        assert_eq!(module.parameters().len(), 4);
        assert_eq!(module.redirect().map(|p| p.name()), Some("alignment"));
    }

    #[test]
    fn schema_rejects_unknown_type() {
        let loader = DescriptorLoader::new().unwrap();
        let json = r#"{"name": "x", "executable": "x", "parameters": [{"name": "a", "type": "blob"}]}"#;
        let err = loader.read_str(Path::new("x.json"), json).unwrap_err();
        assert!(matches!(err, DescriptorError::Load { .. }));
    }

    #[test]
    fn construction_checks_run_after_schema() {
        let loader = DescriptorLoader::new().unwrap();
        let json = r#"{"name": "x", "executable": "x", "parameters": [
            {"name": "a", "type": "string", "flag": "-a"},
            {"name": "a", "type": "string", "flag": "-b"}
        ]}"#;
        let err = loader.read_str(Path::new("x.json"), json).unwrap_err();
        assert!(err.to_string().contains("Duplicate parameter name: a"));
    }

    #[test]
    fn reads_descriptor_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bwa_mem.json"), BWA_MEM).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a descriptor").unwrap();

        let loader = DescriptorLoader::new().unwrap();
        let modules = loader.read_dir(dir.path()).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].1.name(), "bwa_mem");
    }
}
