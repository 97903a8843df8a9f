//! Format-to-driver routing.
//!
//! Each backend owns a fixed, disjoint set of extensions. A small table of
//! platform overrides is consulted first; anything unrecognized falls back
//! to the rodio driver.

use std::path::Path;

use super::types::DriverKind;

/// Formats decoded by the rodio driver.
pub const RODIO_FORMATS: &[&str] = &["mp3", "wav", "wave", "m4a", "aac"];

/// Formats decoded by the symphonia driver.
pub const SYMPHONIA_FORMATS: &[&str] = &["flac", "ogg", "oga", "aif", "aiff", "aifc", "mka", "caf"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// `(platform, extension, driver)` routes that beat the format tables.
///
/// `m4a` must not reach the rodio path on Linux (known AAC decode defect).
pub const PLATFORM_OVERRIDES: &[(Platform, &str, DriverKind)] =
    &[(Platform::Linux, "m4a", DriverKind::Symphonia)];

/// Outcome of routing one extension.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Route {
    pub driver: DriverKind,
    /// `false` when neither table knows the extension and the default was used.
    pub recognized: bool,
}

/// Lowercase text after the final `.` of the file name, or `""`.
pub fn extension_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Pick the driver for `ext` (lowercase, no dot) on `platform`.
pub fn select_driver(ext: &str, platform: Platform) -> Route {
    if let Some((_, _, driver)) = PLATFORM_OVERRIDES
        .iter()
        .find(|(p, e, _)| *p == platform && *e == ext)
    {
        return Route {
            driver: *driver,
            recognized: true,
        };
    }

    if RODIO_FORMATS.contains(&ext) {
        Route {
            driver: DriverKind::Rodio,
            recognized: true,
        }
    } else if SYMPHONIA_FORMATS.contains(&ext) {
        Route {
            driver: DriverKind::Symphonia,
            recognized: true,
        }
    } else {
        Route {
            driver: DriverKind::default(),
            recognized: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercase_text_after_last_dot() {
        assert_eq!(extension_of(Path::new("/m/Song.MP3")), "mp3");
        assert_eq!(extension_of(Path::new("/m/a.b.FlAc")), "flac");
        assert_eq!(extension_of(Path::new("/m/noext")), "");
        assert_eq!(extension_of(Path::new("/m.dir/noext")), "");
        assert_eq!(extension_of(Path::new("/m/trailing.")), "");
    }

    #[test]
    fn format_tables_are_disjoint() {
        for ext in RODIO_FORMATS {
            assert!(!SYMPHONIA_FORMATS.contains(ext), "{ext} in both tables");
        }
    }

    #[test]
    fn tables_route_to_their_driver_on_every_platform() {
        for platform in [Platform::MacOs, Platform::Windows, Platform::Other] {
            for ext in RODIO_FORMATS {
                assert_eq!(select_driver(ext, platform).driver, DriverKind::Rodio);
            }
            for ext in SYMPHONIA_FORMATS {
                assert_eq!(select_driver(ext, platform).driver, DriverKind::Symphonia);
            }
        }
    }

    #[test]
    fn linux_override_moves_m4a_to_symphonia() {
        assert_eq!(
            select_driver("m4a", Platform::Linux),
            Route {
                driver: DriverKind::Symphonia,
                recognized: true
            }
        );
        assert_eq!(select_driver("m4a", Platform::Windows).driver, DriverKind::Rodio);
        // Only that one extension is affected.
        assert_eq!(select_driver("aac", Platform::Linux).driver, DriverKind::Rodio);
        assert_eq!(select_driver("mp3", Platform::Linux).driver, DriverKind::Rodio);
    }

    #[test]
    fn unknown_formats_default_to_rodio_unrecognized() {
        let r = select_driver("xyz", Platform::Linux);
        assert_eq!(r.driver, DriverKind::Rodio);
        assert!(!r.recognized);
        assert!(!select_driver("", Platform::MacOs).recognized);
    }

    #[test]
    fn routing_is_a_function_of_extension() {
        let a = select_driver("flac", Platform::Windows);
        let b = select_driver("flac", Platform::Windows);
        assert_eq!(a, b);
    }
}
