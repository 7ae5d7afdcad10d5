use std::{
    io,
    path::{Path, PathBuf},
};

#[cfg(unix)]
const ENTRY_NAME: &str = "osl.desktop";
#[cfg(windows)]
const LINK_NAME: &str = "OSL.lnk";

/// Best-effort desktop shortcut to the running launcher
pub fn create_shortcut() -> bool {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => {
            log::warn!("failed to resolve launcher executable: {err}");
            return false;
        }
    };

    let Some(dir) = shortcut_dir() else {
        log::warn!("no desktop directory available");
        return false;
    };

    match write_shortcut(&dir, &exe) {
        Ok(path) => {
            log::info!("created shortcut {}", path.display());
            true
        }
        Err(err) => {
            log::warn!("failed to create shortcut in {}: {err}", dir.display());
            false
        }
    }
}

#[cfg(not(windows))]
fn shortcut_dir() -> Option<PathBuf> {
    dirs::desktop_dir()
        .filter(|d| d.is_dir())
        .or_else(|| dirs::data_dir().map(|d| d.join("applications")))
}

#[cfg(windows)]
fn shortcut_dir() -> Option<PathBuf> {
    dirs::desktop_dir()
}

#[cfg(unix)]
fn write_shortcut(dir: &Path, exe: &Path) -> io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir)?;

    let path = dir.join(ENTRY_NAME);
    let entry = format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=OSL\n\
         Comment=osu! server list launcher\n\
         Exec=\"{}\"\n\
         Terminal=false\n\
         Categories=Game;\n",
        exe.display()
    );
    std::fs::write(&path, entry)?;

    // desktops only trust executable launchers
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;

    Ok(path)
}

#[cfg(windows)]
fn write_shortcut(dir: &Path, exe: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(LINK_NAME);

    let mut link =
        mslnk::ShellLink::new(exe).map_err(|err| io::Error::other(err.to_string()))?;
    link.set_name(Some("OSL - osu! Server List Launcher".to_owned()));
    if let Some(workdir) = exe.parent() {
        link.set_working_dir(Some(workdir.display().to_string()));
    }
    link.set_icon_location(Some(exe.display().to_string()));

    link.create_lnk(&path)
        .map_err(|err| io::Error::other(err.to_string()))?;

    Ok(path)
}

#[cfg(not(any(unix, windows)))]
fn write_shortcut(_dir: &Path, _exe: &Path) -> io::Result<PathBuf> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "shortcuts are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    #[test]
    fn test_write_shortcut() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Desktop");

        let path = write_shortcut(&target, Path::new("/opt/osl/osl")).unwrap();
        assert_eq!(path, target.join(ENTRY_NAME));

        let entry = freedesktop_entry_parser::parse_entry(&path).unwrap();
        let section = entry.section("Desktop Entry");

        assert_eq!(section.attr("Name"), Some("OSL"));
        assert_eq!(section.attr("Exec"), Some("\"/opt/osl/osl\""));
        assert_eq!(section.attr("Type"), Some("Application"));
    }

    #[test]
    fn test_write_shortcut_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        write_shortcut(dir.path(), Path::new("/old/osl")).unwrap();
        let path = write_shortcut(dir.path(), Path::new("/new/osl")).unwrap();

        let entry = freedesktop_entry_parser::parse_entry(&path).unwrap();
        assert_eq!(
            entry.section("Desktop Entry").attr("Exec"),
            Some("\"/new/osl\"")
        );
    }
}
