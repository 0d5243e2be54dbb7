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

//! Subscriber list.
//!
//! The list is a plain text file with one address per line. Each invocation
//! of the controller is a separate process, so every mutation is a
//! read-modify-write cycle performed while holding an exclusive lock on a
//! sibling `.lock` file, and the new list replaces the old one with an atomic
//! rename.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use log::trace;

use crate::errors::*;

/// Persisted list of subscribed addresses.
#[derive(Debug)]
pub struct SubscriberStore {
    path: PathBuf,
    emails: Vec<String>,
}

impl SubscriberStore {
    /// Load the list stored at `path`. A missing file is an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let emails = read_list(&path)?;
        Ok(Self { path, emails })
    }

    /// Location of the list.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribed addresses, in their on-disk order.
    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// Whether `address` is subscribed.
    pub fn contains(&self, address: &str) -> bool {
        self.emails.iter().any(|e| e == address)
    }

    /// Re-read the list from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.emails = read_list(&self.path)?;
        Ok(())
    }

    /// Append `address` to the list and persist it.
    ///
    /// The store does not deduplicate: callers check [`Self::contains`]
    /// first.
    pub fn subscribe(&mut self, address: &str) -> Result<()> {
        self.modify(|emails| {
            emails.push(address.to_string());
            Ok(true)
        })?;
        trace!("subscribe {address:?} in {}.", self.path.display());
        Ok(())
    }

    /// Append `address` unless the list already holds it. The membership
    /// test and the write happen under the same lock.
    ///
    /// Returns whether the address was added.
    pub fn subscribe_if_absent(&mut self, address: &str) -> Result<bool> {
        let added = self.modify(|emails| {
            if emails.iter().any(|e| e == address) {
                return Ok(false);
            }
            emails.push(address.to_string());
            Ok(true)
        })?;
        if added {
            trace!("subscribe {address:?} in {}.", self.path.display());
        }
        Ok(added)
    }

    /// Remove the first occurrence of `address` and persist the list.
    ///
    /// Fails with [`Error::NotSubscribed`] without writing anything if the
    /// address is absent.
    pub fn unsubscribe(&mut self, address: &str) -> Result<()> {
        self.modify(|emails| {
            let index = emails
                .iter()
                .position(|e| e == address)
                .ok_or_else(|| Error::NotSubscribed(address.to_string()))?;
            emails.remove(index);
            Ok(true)
        })?;
        trace!("unsubscribe {address:?} from {}.", self.path.display());
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Run `f` on a fresh copy of the list while holding the lock, then
    /// replace the persisted list with the result. Nothing is written if `f`
    /// fails or returns `false`.
    fn modify<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<String>) -> Result<bool>,
    {
        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Could not open lock file {}.", lock_path.display()))?;
        lock.lock()
            .with_context(|| format!("Could not lock {}.", lock_path.display()))?;

        let mut emails = read_list(&self.path)?;
        let changed = f(&mut emails)?;
        if changed {
            write_list(&self.path, &emails)?;
        }
        self.emails = emails;

        // Closing the file also releases the lock.
        drop(lock);
        Ok(changed)
    }
}

fn read_list(path: &Path) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => {
            return Err(anyhow::Error::from(err)
                .context(format!("Could not read subscriber list {}.", path.display()))
                .into())
        }
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_list(path: &Path, emails: &[String]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Could not create temporary file in {}.", dir.display()))?;
    for email in emails {
        writeln!(file, "{email}")
            .with_context(|| format!("Could not write to {}.", file.path().display()))?;
    }
    file.as_file()
        .sync_all()
        .with_context(|| format!("Could not sync {}.", file.path().display()))?;
    let _: File = file
        .persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Could not save subscriber list {}.", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let tmp_dir = TempDir::new().unwrap();
        let store = SubscriberStore::open(tmp_dir.path().join("emails")).unwrap();
        assert!(store.emails().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_subscribe_persists() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        let mut store = SubscriberStore::open(&path).unwrap();
        store.subscribe("a@example.com").unwrap();
        store.subscribe("b@example.com").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a@example.com\nb@example.com\n"
        );
        let store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.emails(), ["a@example.com", "b@example.com"]);
        assert!(store.contains("b@example.com"));
        assert!(!store.contains("c@example.com"));
    }

    #[test]
    fn test_unsubscribe() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        std::fs::write(&path, "a@example.com\n\nb@example.com\nc@example.com\n").unwrap();
        let mut store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.emails().len(), 3);

        store.unsubscribe("b@example.com").unwrap();
        assert_eq!(store.emails(), ["a@example.com", "c@example.com"]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "a@example.com\nc@example.com\n"
        );
    }

    #[test]
    fn test_unsubscribe_absent_does_not_write() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        std::fs::write(&path, "a@example.com").unwrap();
        let mut store = SubscriberStore::open(&path).unwrap();

        assert!(matches!(
            store.unsubscribe("b@example.com"),
            Err(Error::NotSubscribed(addr)) if addr == "b@example.com"
        ));
        // The file was not rewritten (it would have gained a trailing newline).
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a@example.com");
        assert_eq!(store.emails(), ["a@example.com"]);
    }

    #[test]
    fn test_unsubscribe_removes_first_occurrence_only() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        std::fs::write(&path, "a@example.com\nb@example.com\na@example.com\n").unwrap();
        let mut store = SubscriberStore::open(&path).unwrap();
        store.unsubscribe("a@example.com").unwrap();
        assert_eq!(store.emails(), ["b@example.com", "a@example.com"]);
    }

    #[test]
    fn test_mutation_sees_other_writers() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        let mut first = SubscriberStore::open(&path).unwrap();
        let mut second = SubscriberStore::open(&path).unwrap();
        first.subscribe("a@example.com").unwrap();
        second.subscribe("b@example.com").unwrap();
        assert_eq!(second.emails(), ["a@example.com", "b@example.com"]);
        first.reload().unwrap();
        assert_eq!(first.emails(), second.emails());
    }

    #[test]
    fn test_subscribe_if_absent_rereads_under_lock() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        let mut first = SubscriberStore::open(&path).unwrap();
        let mut second = SubscriberStore::open(&path).unwrap();
        assert!(first.subscribe_if_absent("a@example.com").unwrap());
        // `second` was loaded before the write and still believes the list is empty.
        assert!(!second.contains("a@example.com"));
        assert!(!second.subscribe_if_absent("a@example.com").unwrap());
        assert_eq!(second.emails(), ["a@example.com"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a@example.com\n");
    }

    #[test]
    fn test_concurrent_subscriptions_are_not_lost() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("emails");
        let handles = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut store = SubscriberStore::open(path).unwrap();
                    for j in 0..5 {
                        store.subscribe(&format!("user{i}-{j}@example.com")).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        let store = SubscriberStore::open(&path).unwrap();
        assert_eq!(store.emails().len(), 40);
    }
}
