/*
 * This file is part of newsletter
 *
 * Copyright 2026 - newsletter contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use std::{
    io::{Read, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::prelude::*;

use super::errors::*;
use crate::Identity;

/// How to send e-mail.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "value")]
pub enum SendMail {
    /// A `melib` configuration for talking to an SMTP server.
    Smtp(melib::smtp::SmtpServerConf),
    /// A plain shell command passed to `sh -c` with the e-mail passed in the
    /// stdin.
    ShellCommand(String),
}

/// The configuration of a newsletter process.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Configuration {
    /// How to send e-mail.
    pub send_mail: SendMail,
    /// The list directory: subscribers, secret, signature and settings.
    pub data_path: PathBuf,
    /// Where pending broadcasts are kept. Defaults to the temporary
    /// directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_path: Option<PathBuf>,
    /// Remove pending broadcasts older than this many seconds. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_retention_secs: Option<u64>,
    /// Delay between two mails of a broadcast, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Local part of the owner address. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_user: Option<String>,
    /// Domain of the owner address. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

const fn default_throttle_ms() -> u64 {
    200
}

impl Configuration {
    /// Create a new configuration value from a given list directory.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            send_mail: SendMail::ShellCommand("/usr/sbin/sendmail -t -i".to_string()),
            data_path: data_path.into(),
            ticket_path: None,
            ticket_retention_secs: None,
            throttle_ms: default_throttle_ms(),
            local_user: None,
            hostname: None,
        }
    }

    /// Deserialize configuration from TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut s = String::new();
        let mut file = std::fs::File::open(path)
            .with_context(|| format!("Configuration file {} not found.", path.display()))?;
        file.read_to_string(&mut s)
            .with_context(|| format!("Could not read from file {}.", path.display()))?;
        let config: Self = toml::from_str(&s)
            .map_err(anyhow::Error::from)
            .with_context(|| {
                format!(
                    "Could not parse configuration file `{}` successfully: ",
                    path.display()
                )
            })?;

        Ok(config)
    }

    /// Default location of the configuration file,
    /// `$XDG_CONFIG_HOME/newsletter/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = xdg::BaseDirectories::with_prefix("newsletter")
            .context("Could not find the XDG base directories.")?;
        Ok(dirs.get_config_home().join("config.toml"))
    }

    /// The identity of the list owner: `local_user` and `hostname` when set,
    /// otherwise the `USER` (or `LOGNAME`) environment variable and
    /// `/etc/hostname`.
    pub fn identity(&self) -> Result<Identity> {
        let local_user = match self.local_user.as_deref() {
            Some(user) => user.to_string(),
            None => std::env::var("USER")
                .or_else(|_| std::env::var("LOGNAME"))
                .context("Could not determine the local user, set `local_user` in the configuration.")?,
        };
        let hostname = match self.hostname.as_deref() {
            Some(hostname) => hostname.to_string(),
            None => std::fs::read_to_string("/etc/hostname")
                .context("Could not determine the host name, set `hostname` in the configuration.")?
                .trim()
                .to_string(),
        };
        if local_user.trim().is_empty() || hostname.is_empty() {
            return Err(Error::new_external(format!(
                "Invalid identity {local_user:?}@{hostname:?}."
            )));
        }
        Ok(Identity::new(local_user.trim(), hostname))
    }

    /// The list directory.
    pub fn data_directory(&self) -> &Path {
        self.data_path.as_path()
    }

    /// The directory of pending broadcasts.
    pub fn ticket_directory(&self) -> PathBuf {
        self.ticket_path
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Delay between two mails of a broadcast.
    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Maximum age of pending broadcasts, if any.
    pub fn ticket_retention(&self) -> Option<Duration> {
        self.ticket_retention_secs.map(Duration::from_secs)
    }

    /// Save message to a custom path. A directory gets a new file named
    /// `{timestamp}-{random}-failed.eml`; an existing file is never
    /// overwritten.
    pub fn save_message_to_path(&self, msg: &str, mut path: PathBuf) -> Result<PathBuf> {
        if path.is_dir() {
            let now = Local::now().timestamp();
            path.push(format!("{}-{:08x}-failed.eml", now, rand::random::<u32>()));
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600) // Read/write for owner only.
            .open(&path)
            .with_context(|| format!("Could not create file {}.", path.display()))?;
        file.write_all(msg.as_bytes())
            .with_context(|| format!("Could not write message to file {}.", path.display()))?;
        file.flush()
            .with_context(|| format!("Could not flush message I/O to file {}.", path.display()))?;
        Ok(path)
    }

    /// Save message to the data directory.
    pub fn save_message(&self, msg: String) -> Result<PathBuf> {
        self.save_message_to_path(&msg, self.data_directory().to_path_buf())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::ser::to_string(self).context("Could not serialize config to TOML")?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_parse_error() {
        let tmp_dir = TempDir::new().unwrap();
        let conf_path = tmp_dir.path().join("conf.toml");
        std::fs::write(&conf_path, b"afjsad skas as a as\n\n\n\n\t\x11\n").unwrap();

        let err = Configuration::from_file(&conf_path).unwrap_err().to_string();
        assert!(
            err.starts_with(&format!(
                "Could not parse configuration file `{}` successfully: ",
                conf_path.display()
            )),
            "{err}"
        );
        assert!(err.contains("TOML parse error at line 1"), "{err}");
    }

    #[test]
    fn test_config_missing_file() {
        let tmp_dir = TempDir::new().unwrap();
        let conf_path = tmp_dir.path().join("nope.toml");
        assert!(matches!(
            Configuration::from_file(&conf_path),
            Err(Error::External(_))
        ));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let tmp_dir = TempDir::new().unwrap();
        let conf_path = tmp_dir.path().join("conf.toml");
        let mut config = Configuration::new(tmp_dir.path().join("list"));
        config.ticket_retention_secs = Some(3600);
        config.local_user = Some("user".into());
        std::fs::write(&conf_path, config.to_toml().unwrap()).unwrap();

        let parsed = Configuration::from_file(&conf_path).unwrap();
        assert_eq!(parsed.data_path, config.data_path);
        assert_eq!(parsed.throttle(), Duration::from_millis(200));
        assert_eq!(parsed.ticket_retention(), Some(Duration::from_secs(3600)));
        assert_eq!(parsed.ticket_directory(), std::env::temp_dir());
        assert_eq!(parsed.local_user.as_deref(), Some("user"));
        assert_eq!(parsed.hostname, None);
        assert!(matches!(
            parsed.send_mail,
            SendMail::ShellCommand(ref cmd) if cmd == "/usr/sbin/sendmail -t -i"
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config: Configuration = toml::from_str(
            "data_path = \"/var/lib/newsletter\"\n\n[send_mail]\ntype = \
             \"ShellCommand\"\nvalue = \"cat\"\n",
        )
        .unwrap();
        assert_eq!(config.throttle_ms, 200);
        assert_eq!(config.ticket_path, None);
        assert_eq!(config.ticket_retention(), None);
    }

    #[test]
    fn test_configured_identity() {
        let mut config = Configuration::new("/var/lib/newsletter");
        config.local_user = Some("user".into());
        config.hostname = Some("club1.fr".into());
        assert_eq!(
            config.identity().unwrap(),
            Identity::new("user", "club1.fr")
        );
        config.hostname = Some(String::new());
        assert!(matches!(config.identity(), Err(Error::External(_))));
    }

    #[test]
    fn test_save_message() {
        use std::os::unix::fs::PermissionsExt;

        let tmp_dir = TempDir::new().unwrap();
        let config = Configuration::new(tmp_dir.path());
        let path = config.save_message("From: nobody".to_string()).unwrap();
        assert!(path.starts_with(tmp_dir.path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "From: nobody");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // Messages saved within the same second are all kept.
        let other = config.save_message("From: somebody".to_string()).unwrap();
        assert_ne!(path, other);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "From: nobody");
        assert_eq!(std::fs::read_to_string(&other).unwrap(), "From: somebody");

        // An explicit file path is not overwritten.
        assert!(matches!(
            config.save_message_to_path("From: again", path.clone()),
            Err(Error::External(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "From: nobody");
    }
}
