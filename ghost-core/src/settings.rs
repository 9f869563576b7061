//! Persisted operator settings: SMTP credentials and per-site contact lists.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ghost/
//!   config.yaml   (mode 0600: holds the SMTP password)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outgoing mail server credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    /// Accepted as a number or a numeric string; the dashboard form sends
    /// the latter once the field has been edited.
    #[serde(deserialize_with = "port_number_or_string")]
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpSettings>,
    /// Site id → contact email addresses.
    #[serde(default)]
    pub site_contacts: BTreeMap<String, Vec<String>>,
}

fn port_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'"))),
    }
}

impl Settings {
    pub fn contacts_for(&self, site_id: &str) -> Vec<String> {
        self.site_contacts.get(site_id).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.ghost/`
pub fn ghost_root(home: &Path) -> PathBuf {
    home.join(".ghost")
}

/// `<home>/.ghost/config.yaml`: pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    ghost_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings. A missing file yields the defaults (no SMTP, no contacts).
pub fn load_at(home: &Path) -> Result<Settings, CoreError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, CoreError> {
    load_at(&home()?)
}

/// Atomically save settings.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), CoreError> {
    let root = ghost_root(home);
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;
    }
    let path = settings_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), CoreError> {
    save_at(&home()?, settings)
}

/// Load, apply `f`, save. Returns the updated settings.
pub fn update_at(
    home: &Path,
    f: impl FnOnce(&mut Settings),
) -> Result<Settings, CoreError> {
    let mut settings = load_at(home)?;
    f(&mut settings);
    save_at(home, &settings)?;
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn smtp() -> SmtpSettings {
        SmtpSettings {
            server: "smtp.example.com".to_string(),
            port: 465,
            user: "ops@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("tempdir");
        let settings = load_at(home.path()).expect("load");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        let mut settings = Settings {
            smtp: Some(smtp()),
            ..Settings::default()
        };
        settings
            .site_contacts
            .insert("site-1".to_string(), vec!["a@example.com".to_string()]);
        save_at(home.path(), &settings).expect("save");
        assert_eq!(load_at(home.path()).expect("load"), settings);
    }

    #[test]
    fn update_preserves_other_fields() {
        let home = TempDir::new().expect("tempdir");
        update_at(home.path(), |s| s.smtp = Some(smtp())).expect("smtp");
        update_at(home.path(), |s| {
            s.site_contacts
                .insert("site-9".to_string(), vec!["b@example.com".to_string()]);
        })
        .expect("contacts");

        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded.smtp, Some(smtp()));
        assert_eq!(loaded.contacts_for("site-9"), vec!["b@example.com"]);
        assert!(loaded.contacts_for("unknown").is_empty());
    }

    #[test]
    fn smtp_port_accepts_number_or_numeric_string() {
        let from_number: SmtpSettings = serde_yaml::from_str(
            "server: smtp.example.com\nport: 465\nuser: ops@example.com\npassword: hunter2\n",
        )
        .expect("number");
        let from_text: SmtpSettings = serde_yaml::from_str(
            "server: smtp.example.com\nport: \" 465\"\nuser: ops@example.com\npassword: hunter2\n",
        )
        .expect("string");
        assert_eq!(from_number, smtp());
        assert_eq!(from_text, smtp());

        let err = serde_yaml::from_str::<SmtpSettings>(
            "server: s\nport: smtp\nuser: u\npassword: p\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid port 'smtp'"));
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &Settings::default()).expect("save");
        let tmp = settings_path_at(home.path()).with_file_name("config.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[cfg(unix)]
    #[test]
    fn settings_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &Settings::default()).expect("save");
        let mode = std::fs::metadata(settings_path_at(home.path()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }
}
