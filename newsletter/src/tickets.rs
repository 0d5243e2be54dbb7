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

//! Pending broadcasts.
//!
//! The `send` route stores the subject and body of the owner's message in two
//! files named after the token of their content. The `send-confirm` route,
//! running in another process, finds them again from the token it extracts
//! out of the `In-Reply-To` header.

use std::{
    fs::OpenOptions,
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use log::{info, trace, warn};

use crate::{errors::*, token::is_token};

const PREFIX: &str = "newsletter-send-";
const SUBJECT_SUFFIX: &str = ".subject.txt";
const BODY_SUFFIX: &str = ".body.txt";

/// Subject and body of a pending broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Subject of the broadcast.
    pub subject: String,
    /// Body of the broadcast.
    pub body: String,
}

/// Directory holding ticket files.
#[derive(Debug, Clone)]
pub struct TicketStore {
    dir: PathBuf,
}

impl TicketStore {
    /// Store tickets in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory of the ticket files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the subject file of `token`.
    pub fn subject_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{PREFIX}{token}{SUBJECT_SUFFIX}"))
    }

    /// Path of the body file of `token`.
    pub fn body_path(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{PREFIX}{token}{BODY_SUFFIX}"))
    }

    /// Save `ticket` under `token`.
    pub fn write(&self, token: &str, ticket: &Ticket) -> Result<()> {
        if !is_token(token) {
            return Err(Error::MalformedId(token.to_string()));
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create directory {}.", self.dir.display()))?;
        write_private(&self.body_path(token), &ticket.body)?;
        write_private(&self.subject_path(token), &ticket.subject)?;
        trace!("wrote ticket {token} in {}.", self.dir.display());
        Ok(())
    }

    /// Read the ticket saved under `token`. Reading does not consume it.
    pub fn read(&self, token: &str) -> Result<Ticket> {
        if !is_token(token) {
            return Err(Error::MalformedId(token.to_string()));
        }
        let body = read_part(&self.body_path(token), token)?;
        let subject = read_part(&self.subject_path(token), token)?;
        Ok(Ticket { subject, body })
    }

    /// Remove the ticket files last modified more than `max_age` ago.
    /// Returns how many files were removed.
    ///
    /// Only listing the directory can fail. Entries that cannot be inspected
    /// or removed, such as the tickets of another user in a shared temporary
    /// directory, are logged and skipped.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(anyhow::Error::from(err)
                    .context(format!("Could not list directory {}.", self.dir.display()))
                    .into())
            }
        };
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("could not read an entry of {}: {err}", self.dir.display());
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(PREFIX)
                || !(name.ends_with(SUBJECT_SUFFIX) || name.ends_with(BODY_SUFFIX))
            {
                continue;
            }
            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => {
                    trace!("skip {}, not a regular file.", path.display());
                    continue;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!("could not inspect ticket file {}: {err}", path.display());
                    continue;
                }
            };
            if now.duration_since(modified).unwrap_or_default() <= max_age {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                // Purged by a concurrent invocation.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!("could not remove ticket file {}: {err}", path.display()),
            }
        }
        if removed > 0 {
            info!("purged {removed} stale ticket files from {}.", self.dir.display());
        }
        Ok(removed)
    }
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

fn write_private(path: &Path, content: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600) // Read/write for owner only.
        .open(path)
        .with_context(|| format!("Could not create file {}.", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Could not write to file {}.", path.display()))?;
    file.flush()
        .with_context(|| format!("Could not flush file {}.", path.display()))?;
    Ok(())
}

fn read_part(path: &Path, token: &str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::TicketNotFound(token.to_string()))
        }
        Err(err) => Err(anyhow::Error::from(err)
            .context(format!("Could not read ticket file {}.", path.display()))
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::token::hash_with_secret;

    #[test]
    fn test_write_read() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path());
        let token = hash_with_secret("WorldHi", "S");
        let ticket = Ticket {
            subject: "Hi".into(),
            body: "World".into(),
        };
        store.write(&token, &ticket).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.subject_path(&token)).unwrap(),
            "Hi"
        );
        assert_eq!(store.read(&token).unwrap(), ticket);
        // Reading is idempotent.
        assert_eq!(store.read(&token).unwrap(), ticket);
    }

    #[test]
    fn test_not_found() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path());
        let token = hash_with_secret("nothing", "S");
        assert!(matches!(store.read(&token), Err(Error::TicketNotFound(_))));

        // A ticket with a missing half is not found either.
        std::fs::write(store.body_path(&token), "body").unwrap();
        assert!(matches!(store.read(&token), Err(Error::TicketNotFound(_))));
    }

    #[test]
    fn test_rejects_paths() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path());
        assert!(matches!(
            store.read("../../etc/passwd"),
            Err(Error::MalformedId(_))
        ));
    }

    #[test]
    fn test_purge() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path());
        let token = hash_with_secret("body", "S");
        store
            .write(
                &token,
                &Ticket {
                    subject: "subject".into(),
                    body: "body".into(),
                },
            )
            .unwrap();
        std::fs::write(tmp_dir.path().join("unrelated.txt"), "keep").unwrap();

        assert_eq!(store.purge_older_than(Duration::from_secs(3600)).unwrap(), 0);
        store.read(&token).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.purge_older_than(Duration::from_millis(1)).unwrap(), 2);
        assert!(matches!(store.read(&token), Err(Error::TicketNotFound(_))));
        assert!(tmp_dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_purge_skips_entries_it_cannot_remove() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path());
        let token = hash_with_secret("body", "S");
        store
            .write(
                &token,
                &Ticket {
                    subject: "subject".into(),
                    body: "body".into(),
                },
            )
            .unwrap();
        // Named like a ticket but `remove_file` cannot delete it.
        let stale_dir = tmp_dir.path().join("newsletter-send-OTHER.body.txt");
        std::fs::create_dir(&stale_dir).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.purge_older_than(Duration::from_millis(1)).unwrap(), 2);
        assert!(stale_dir.is_dir());
        assert!(matches!(store.read(&token), Err(Error::TicketNotFound(_))));
    }

    #[test]
    fn test_purge_missing_directory() {
        let tmp_dir = TempDir::new().unwrap();
        let store = TicketStore::new(tmp_dir.path().join("nope"));
        assert_eq!(store.purge_older_than(Duration::ZERO).unwrap(), 0);
    }
}
