use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const PREFERENCES_DIR: &str = ".coinflip";
const PREFERENCES_FILE: &str = "preferences.json";

/// Durable key/value storage for user choices that survive restarts.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

pub fn default_preferences_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(PREFERENCES_DIR)
        .join(PREFERENCES_FILE))
}

pub fn resolve_preferences_path(path: Option<&str>) -> Result<PathBuf> {
    match path {
        Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
        None => default_preferences_path(),
    }
}

/// Preferences kept as one flat JSON object on disk. The whole file is
/// rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFilePreferences {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = read_values(&path)?;
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        write_values(&self.path, &self.values)
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = fs::read(path).wrap_err_with(|| {
        format!("Failed to read preferences file {}", path.display())
    })?;
    if data.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(&data).wrap_err("Failed to parse preferences JSON")
}

fn write_values(path: &Path, values: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).wrap_err_with(|| {
            format!("Failed to create preferences directory {}", parent.display())
        })?;
    }
    let json =
        serde_json::to_vec_pretty(values).wrap_err("Failed to serialize preferences")?;
    fs::write(path, json).wrap_err("Failed to write preferences")?;
    Ok(())
}
