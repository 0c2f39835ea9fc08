//! Loading pipeline: finds configuration files, deserializes them and
//! resolves resource names into scheduler types.
//!
//! Every file may be written as RON, TOML or JSON. The format is taken from
//! the extension, and a directory may hold only one format per base name.

use crate::schema::{CryostatData, DecayData, SchedulerSettingsData};
use resched_core::overrides::{CheatOptions, OverrideFlags};
use resched_core::resource::ResourceName;
use resched_core::scheduler::FaultPolicy;
use resched_parts::cryostat::{Cryostat, CryostatConfig};
use resched_parts::decay::{DecayConfig, DecayModule};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Base name of the required scheduler settings file.
pub const SCHEDULER_FILE: &str = "scheduler";
/// Base name of the optional decay list.
pub const DECAY_FILE: &str = "decay";
/// Base name of the optional cryostat list.
pub const CRYOSTAT_FILE: &str = "cryostat";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A numeric field is negative or not finite.
    #[error("invalid value {value} for '{field}' in {file}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        value: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `ConflictingFormats` if more than
/// one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if !candidate.is_file() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. RON and JSON files hold the list itself; a TOML file
/// holds it as an array of tables under `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let mut table: toml::Table = deserialize_file(path)?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution
// ===========================================================================

/// Resolve a storage name, rejecting anything that is not a known resource.
pub fn resolve_resource(name: &str, file: &Path) -> Result<ResourceName, DataLoadError> {
    let resource = ResourceName::parse(name);
    if resource.is_known() {
        Ok(resource)
    } else {
        Err(DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected_kind: "resource",
        })
    }
}

fn resolve_all(names: &[String], file: &Path) -> Result<Vec<ResourceName>, DataLoadError> {
    names.iter().map(|n| resolve_resource(n, file)).collect()
}

/// Returns `DuplicateName` if `name` is already in `map`.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn check_value(value: f64, field: &'static str, file: &Path) -> Result<f64, DataLoadError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field,
            value,
        })
    }
}

// ===========================================================================
// Resolved data
// ===========================================================================

/// Everything loaded from a configuration directory, with names resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerData {
    pub strict: bool,
    pub cheats: CheatOptions,
    pub unlimited: Vec<ResourceName>,
    pub ignore_limits: Vec<ResourceName>,
    pub decay: Vec<DecayConfig>,
    pub cryostats: Vec<CryostatConfig>,
}

impl SchedulerData {
    pub fn fault_policy(&self) -> FaultPolicy {
        if self.strict {
            FaultPolicy::Strict
        } else {
            FaultPolicy::Isolate
        }
    }

    /// Cheat toggles merged with the explicit per-resource lists.
    pub fn overrides(&self) -> OverrideFlags {
        let mut builder = OverrideFlags::builder().cheats(self.cheats);
        for &resource in &self.unlimited {
            builder = builder.unlimited(resource);
        }
        for &resource in &self.ignore_limits {
            builder = builder.ignore_limits(resource);
        }
        builder.build()
    }

    /// One decay module per configured entry.
    pub fn decay_modules(&self) -> impl Iterator<Item = DecayModule> + '_ {
        self.decay.iter().cloned().map(DecayModule::new)
    }

    pub fn cryostat_modules(&self) -> impl Iterator<Item = Cryostat> + '_ {
        self.cryostats.iter().cloned().map(Cryostat::new)
    }
}

fn resolve_decay(entry: &DecayData, file: &Path) -> Result<DecayConfig, DataLoadError> {
    Ok(DecayConfig {
        resource: resolve_resource(&entry.resource, file)?,
        product: resolve_resource(&entry.product, file)?,
        decay_constant: check_value(entry.decay_constant, "decay_constant", file)?,
        density_ratio: check_value(entry.density_ratio, "density_ratio", file)?,
        decay_ratio: check_value(entry.decay_ratio, "decay_ratio", file)?,
    })
}

fn resolve_cryostat(entry: &CryostatData, file: &Path) -> Result<CryostatConfig, DataLoadError> {
    Ok(CryostatConfig {
        resource: resolve_resource(&entry.resource, file)?,
        boil_off_rate: check_value(entry.boil_off_rate, "boil_off_rate", file)?,
        boil_off_temp: check_value(entry.boil_off_temp, "boil_off_temp", file)?,
        power_req_kw: check_value(entry.power_req_kw, "power_req_kw", file)?,
        power_req_mult: check_value(entry.power_req_mult, "power_req_mult", file)?,
    })
}

/// Load and resolve all configuration files in `dir`.
///
/// `scheduler.*` is required; `decay.*` and `cryostat.*` are optional.
/// Cryostats are keyed by resource, so two entries for the same resource
/// are a `DuplicateName` error.
pub fn load_scheduler_data(dir: &Path) -> Result<SchedulerData, DataLoadError> {
    let settings_path = require_data_file(dir, SCHEDULER_FILE)?;
    let settings: SchedulerSettingsData = deserialize_file(&settings_path)?;

    let mut data = SchedulerData {
        strict: settings.strict,
        cheats: settings.cheats,
        unlimited: resolve_all(&settings.unlimited, &settings_path)?,
        ignore_limits: resolve_all(&settings.ignore_limits, &settings_path)?,
        ..Default::default()
    };

    if let Some(path) = find_data_file(dir, DECAY_FILE)? {
        let entries: Vec<DecayData> = deserialize_list(&path, DECAY_FILE)?;
        data.decay = entries
            .iter()
            .map(|e| resolve_decay(e, &path))
            .collect::<Result<_, _>>()?;
    }

    if let Some(path) = find_data_file(dir, CRYOSTAT_FILE)? {
        let entries: Vec<CryostatData> = deserialize_list(&path, CRYOSTAT_FILE)?;
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            check_duplicate(&seen, &entry.resource, &path)?;
            data.cryostats.push(resolve_cryostat(entry, &path)?);
            seen.insert(entry.resource.clone(), index);
        }
    }

    Ok(data)
}

// ===========================================================================
// Tests
// ===========================================================================
