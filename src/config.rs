use std::{
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::view::{SortMode, StartView};

pub const SELECTION_COLOR: Color32 = Color32::from_rgb(0x65, 0x28, 0xF7);
pub const FAVORITE_COLOR: Color32 = Color32::GOLD;
pub const ONLINE_COLOR: Color32 = Color32::GREEN;
pub const OFFLINE_COLOR: Color32 = Color32::RED;

pub const DEFAULT_CATALOG_URL: &str =
    "https://osu-server-list.com/api/v2/client/servers?key=PfGLccr8pA5nOp1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Game executable
    pub osu_path: Option<PathBuf>,
    pub sort_by: SortMode,
    /// Sort the favorites list by players
    pub favorites_sort: bool,
    pub auto_start_sort: StartView,
    /// Quit the launcher once the game exits cleanly
    pub auto_close: bool,
    pub has_launched: bool,
    pub catalog: Catalog,
    pub launch: Launch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Launch {
    /// Command line prepended to the executable, e.g. `wine`
    pub wrapper: Option<String>,
    /// Extensions accepted when picking the executable
    pub extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            osu_path: None,
            sort_by: SortMode::None,
            favorites_sort: false,
            auto_start_sort: StartView::None,
            auto_close: false,
            has_launched: false,
            catalog: Catalog::default(),
            launch: Launch::default(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_owned(),
        }
    }
}

impl Default for Launch {
    fn default() -> Self {
        Self {
            wrapper: None,
            extensions: vec!["exe".to_owned()],
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        let settings = toml::from_str(&buf)?;

        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let buf = toml::to_string_pretty(self)?;
        std::fs::write(path, buf)?;

        Ok(())
    }

    /// Checks a picked executable against the accepted extensions
    pub fn accepts_executable(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|x| x.to_str()) else {
            return false;
        };

        self.launch
            .extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
    }

    /// Splits the wrapper command line into program and arguments
    pub fn wrapper(&self) -> anyhow::Result<Vec<String>> {
        match self.launch.wrapper.as_deref().map(str::trim) {
            Some(wrapper) if !wrapper.is_empty() => Ok(shell_words::split(wrapper)?),
            _ => Ok(vec![]),
        }
    }
}
