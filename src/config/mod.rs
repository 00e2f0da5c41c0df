use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use crate::sml::SmlError;

fn reader_strict_arity_default() -> bool { false }
fn reader_render_ids_default() -> bool { true }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ReaderConfig {
    /* reject tuples that carry more elements than the message kind defines */
    #[serde(default="reader_strict_arity_default")]
    pub strict_arity: bool,
    /* render server and client ids as text instead of raw octets */
    #[serde(default="reader_render_ids_default")]
    pub render_ids: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig { strict_arity: reader_strict_arity_default(), render_ids: reader_render_ids_default() }
    }
}

fn generator_abort_on_error_default() -> u8 { 0 }
fn generator_sml_version_default() -> u8 { 1 }
fn generator_trx_prefix_len_default() -> usize { 7 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default="generator_abort_on_error_default")]
    pub abort_on_error: u8,
    #[serde(default="generator_sml_version_default")]
    pub sml_version: u8,
    #[serde(default="generator_trx_prefix_len_default")]
    pub trx_prefix_len: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            abort_on_error: generator_abort_on_error_default(),
            sml_version: generator_sml_version_default(),
            trx_prefix_len: generator_trx_prefix_len_default(),
        }
    }
}

fn framing_verify_crc_default() -> bool { true }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct FramingConfig {
    #[serde(default="framing_verify_crc_default")]
    pub verify_crc: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig { verify_crc: framing_verify_crc_default() }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct SmlConfig {
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub framing: FramingConfig,
}

impl SmlConfig {
    /// Load `config/sml.yaml` or `sml.yaml`, defaults if neither exists.
    pub fn load() -> Result<Self, SmlError> {
        for candidate in ["config/sml.yaml", "sml.yaml"] {
            if Path::new(candidate).exists() {
                return Self::from_file(candidate);
            }
        }
        debug!("No sml.yaml found, using defaults");
        Ok(SmlConfig::default())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SmlError> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|e| SmlError::Config(format!("unable to open {}: {e}", path.display())))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SmlError::Config(format!("unable to read {}: {e}", path.display())))?;

        let config = Self::from_yaml(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, SmlError> {
        /* an empty document is a valid config with all defaults */
        if contents.trim().is_empty() {
            return Ok(SmlConfig::default());
        }
        serde_yml::from_str(contents).map_err(|e| SmlError::Config(e.to_string()))
    }
}
