use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    command::HandlerDescriptor,
    error::LoadError,
    lua,
    registry::{Registry, RegistryState},
};

const MODULE_EXTENSIONS: [&str; 2] = ["luau", "lua"];

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub errors: Vec<LoadError>,
}

#[derive(Debug, Default)]
pub struct UnloadReport {
    pub unloaded: Vec<String>,
    pub errors: Vec<LoadError>,
}

#[derive(Debug, Default)]
pub struct ReloadReport {
    pub total: usize,
    pub units: usize,
    pub errors: Vec<LoadError>,
}

/// The valid modules of one unit directory, plus what went wrong with the rest.
struct ScannedUnit {
    descriptors: Vec<HandlerDescriptor>,
    errors: Vec<LoadError>,
}

/// Reads command units from disk into the [`Registry`].
///
/// Every operation holds `serialize` for its whole body, so a reload can never
/// interleave with a load or unload.
pub struct Loader {
    root: PathBuf,
    prefix: String,
    registry: Arc<Registry>,
    http: reqwest::Client,
    lua: Mutex<mlua::Lua>,
    serialize: tokio::sync::Mutex<()>,
    change_tx: Option<flume::Sender<()>>,
}

impl Loader {
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: &str,
        registry: Arc<Registry>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();
        let lua = lua::create_lua_state(registry.clone(), http.clone(), prefix)?;
        Ok(Self {
            root: root.into(),
            prefix: prefix.to_string(),
            registry,
            http,
            lua: Mutex::new(lua),
            serialize: tokio::sync::Mutex::new(()),
            change_tx: None,
        })
    }

    /// Signal `tx` whenever the registry may have changed.
    pub fn with_change_notifier(mut self, tx: flume::Sender<()>) -> Self {
        self.change_tx = Some(tx);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Names of the unit directories currently on disk, sorted.
    pub async fn available_units(&self) -> Vec<String> {
        match list_units(&self.root).await {
            Ok(units) => units,
            Err(err) => {
                tracing::warn!(root = %self.root.display(), "failed to list units: {err}");
                vec![]
            }
        }
    }

    pub async fn load_unit(&self, unit: &str) -> LoadReport {
        let _guard = self.serialize.lock().await;
        let lua = self.lua.lock().clone();

        let report = match self.scan_unit(&lua, unit).await {
            Ok(scanned) => LoadReport {
                loaded: self.registry.install_unit(unit, scanned.descriptors),
                errors: scanned.errors,
            },
            Err(err) => LoadReport {
                loaded: vec![],
                errors: vec![err],
            },
        };
        tracing::info!(
            unit,
            loaded = report.loaded.len(),
            errors = report.errors.len(),
            "loaded unit"
        );

        self.notify();
        report
    }

    pub async fn unload_unit(&self, unit: &str) -> UnloadReport {
        let _guard = self.serialize.lock().await;

        let report = match self.registry.remove_unit(unit) {
            Some(unloaded) => UnloadReport {
                unloaded,
                errors: vec![],
            },
            None => {
                let on_disk = match self.unit_dir(unit) {
                    Ok(dir) => is_dir(&dir).await,
                    Err(err) => {
                        return UnloadReport {
                            unloaded: vec![],
                            errors: vec![err],
                        };
                    }
                };
                let err = if on_disk {
                    LoadError::NotLoaded(unit.to_string())
                } else {
                    LoadError::UnitNotFound(unit.to_string())
                };
                UnloadReport {
                    unloaded: vec![],
                    errors: vec![err],
                }
            }
        };
        tracing::info!(unit, unloaded = report.unloaded.len(), "unloaded unit");

        self.notify();
        report
    }

    /// Rebuilds the registry from every unit on disk, in a fresh Lua state.
    pub async fn reload_all(&self) -> ReloadReport {
        let _guard = self.serialize.lock().await;
        let mut report = ReloadReport::default();

        let lua = match lua::create_lua_state(self.registry.clone(), self.http.clone(), &self.prefix)
        {
            Ok(lua) => lua,
            Err(err) => {
                tracing::error!("failed to create a fresh Lua state, reusing the old one: {err}");
                self.lua.lock().clone()
            }
        };

        let units = match list_units(&self.root).await {
            Ok(units) => units,
            Err(err) => {
                report.errors.push(LoadError::Scan {
                    unit: self.root.display().to_string(),
                    message: err.to_string(),
                });
                vec![]
            }
        };

        let mut state = RegistryState::default();
        for unit in &units {
            match self.scan_unit(&lua, unit).await {
                Ok(scanned) => {
                    report.total += state.install_unit(unit, scanned.descriptors).len();
                    report.units += 1;
                    report.errors.extend(scanned.errors);
                }
                Err(err) => report.errors.push(err),
            }
        }

        self.registry.replace(state);
        *self.lua.lock() = lua;
        tracing::info!(
            total = report.total,
            units = report.units,
            errors = report.errors.len(),
            "reloaded all units"
        );

        self.notify();
        report
    }

    async fn scan_unit(&self, lua: &mlua::Lua, unit: &str) -> Result<ScannedUnit, LoadError> {
        let dir = self.unit_dir(unit)?;
        if !is_dir(&dir).await {
            return Err(LoadError::UnitNotFound(unit.to_string()));
        }

        let files = list_modules(&dir).await.map_err(|err| LoadError::Scan {
            unit: unit.to_string(),
            message: err.to_string(),
        })?;

        let mut scanned = ScannedUnit {
            descriptors: vec![],
            errors: vec![],
        };
        for file in files {
            // Always read from disk so edits since the last load are picked up
            let code = match tokio::fs::read_to_string(dir.join(&file)).await {
                Ok(code) => code,
                Err(err) => {
                    scanned.errors.push(LoadError::Module {
                        file,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match lua::load_module(lua, unit, &file, &code) {
                Ok(descriptor) => scanned.descriptors.push(descriptor),
                Err(err) => {
                    tracing::warn!(unit, "{err}");
                    scanned.errors.push(err);
                }
            }
        }

        Ok(scanned)
    }

    fn unit_dir(&self, unit: &str) -> Result<PathBuf, LoadError> {
        let valid = !unit.is_empty()
            && !unit.starts_with('.')
            && !unit.contains(['/', '\\'])
            && Path::new(unit).components().count() == 1;
        if valid {
            Ok(self.root.join(unit))
        } else {
            Err(LoadError::InvalidUnitName(unit.to_string()))
        }
    }

    fn notify(&self) {
        if let Some(tx) = &self.change_tx {
            tx.send(()).ok();
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

/// Top-level, non-hidden directories under `root`, sorted by name.
async fn list_units(root: &Path) -> std::io::Result<Vec<String>> {
    let mut units = vec![];
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str()
            && !name.starts_with('.')
        {
            units.push(name.to_string());
        }
    }
    units.sort();
    Ok(units)
}

/// Module files directly inside `dir`, sorted by name.
async fn list_modules(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut files = vec![];
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_module = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext));
        if is_module && let Some(name) = entry.file_name().to_str() {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}
