use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    config::Settings,
    error::{Error, Result},
    ledger::Ledger,
    view::Favorites,
};

const SETTINGS_FILE: &str = "settings.toml";
const LEDGER_FILE: &str = "playtime.json";
const FAVORITES_FILE: &str = "favorites.json";

pub trait LedgerRepository {
    fn load(&self) -> Result<Ledger>;
    fn save(&self, ledger: &Ledger) -> Result<()>;
}

/// Persisted launcher state, one file per concern
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        log::debug!("storage dir: {}", dir.display());

        Ok(Self { dir })
    }

    /// `<data dir>/osl`, or the working directory when the platform has none
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join(env!("CARGO_PKG_NAME")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn load_settings(&self) -> Settings {
        let path = self.settings_path();
        if !path.exists() {
            return Settings::default();
        }

        Settings::load(&path)
            .map_err(|err| {
                log::warn!(
                    "failed to load settings from path {}: {err}",
                    path.display()
                )
            })
            .unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        settings
            .save(self.settings_path())
            .map_err(|err| Error::storage(format!("{err:#}")))
    }

    pub fn load_favorites(&self) -> Favorites {
        let path = self.dir.join(FAVORITES_FILE);

        let favorites = match read_optional(&path) {
            Ok(Some(json)) => serde_json::from_str(&json).map_err(Error::from),
            Ok(None) => return Favorites::default(),
            Err(err) => Err(err),
        };

        favorites
            .map_err(|err| log::warn!("failed to load favorites: {err}"))
            .unwrap_or_default()
    }

    pub fn save_favorites(&self, favorites: &Favorites) -> Result<()> {
        let json = serde_json::to_string_pretty(favorites)?;
        write_replace(&self.dir.join(FAVORITES_FILE), &json)
    }
}

impl LedgerRepository for Storage {
    fn load(&self) -> Result<Ledger> {
        let path = self.dir.join(LEDGER_FILE);

        let Some(json) = read_optional(&path)? else {
            return Ok(Ledger::new());
        };

        match Ledger::from_json(&json) {
            Ok(ledger) => Ok(ledger),
            Err(err) => {
                let backup = path.with_extension("json.bak");
                log::warn!(
                    "discarding unreadable playtime data ({err}), kept as {}",
                    backup.display()
                );
                fs::rename(&path, &backup)?;
                Ok(Ledger::new())
            }
        }
    }

    fn save(&self, ledger: &Ledger) -> Result<()> {
        write_replace(&self.dir.join(LEDGER_FILE), &ledger.to_json()?)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes through a sibling file so a crash never leaves a truncated blob
fn write_replace(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod memory {
    use std::cell::{Cell, RefCell};

    use super::*;

    /// In-memory repository counting writes
    #[derive(Default)]
    pub struct MemoryRepository {
        pub ledger: RefCell<Ledger>,
        pub saves: Cell<usize>,
    }

    impl LedgerRepository for MemoryRepository {
        fn load(&self) -> Result<Ledger> {
            Ok(self.ledger.borrow().clone())
        }

        fn save(&self, ledger: &Ledger) -> Result<()> {
            *self.ledger.borrow_mut() = ledger.clone();
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::server;
    use crate::view::SortMode;
    use chrono::{Duration, Utc};

    #[test]
    fn test_ledger_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert!(storage.load().unwrap().is_empty());

        let now = Utc::now();
        let mut ledger = Ledger::new();
        ledger.record_session_start(&server(1, "Akatsuki", 0, 0), now);
        ledger.record_session_end(1, now + Duration::minutes(3));
        storage.save(&ledger).unwrap();

        assert_eq!(storage.load().unwrap(), ledger);
        assert!(!dir.path().join("playtime.tmp").exists());
    }

    #[test]
    fn test_corrupt_ledger_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        fs::write(dir.path().join(LEDGER_FILE), "not json").unwrap();

        assert!(storage.load().unwrap().is_empty());
        assert!(dir.path().join("playtime.json.bak").exists());
        assert!(!dir.path().join(LEDGER_FILE).exists());
    }

    #[test]
    fn test_favorites_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        assert!(storage.load_favorites().is_empty());

        let mut favorites = Favorites::default();
        favorites.toggle(&server(2, "Bancho", 5, 5));
        favorites.toggle(&server(1, "Akatsuki", 5, 5));
        storage.save_favorites(&favorites).unwrap();

        assert_eq!(storage.load_favorites(), favorites);
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("nested")).unwrap();

        assert_eq!(storage.load_settings(), Settings::default());

        let settings = Settings {
            sort_by: SortMode::Votes,
            auto_close: true,
            ..Default::default()
        };
        storage.save_settings(&settings).unwrap();

        assert_eq!(storage.load_settings(), settings);
    }

    #[test]
    fn test_broken_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        fs::write(storage.settings_path(), "sort_by = 42").unwrap();

        assert_eq!(storage.load_settings(), Settings::default());
    }
}
