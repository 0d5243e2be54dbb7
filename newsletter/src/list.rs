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

//! The list directory and the operations shared by the controller and the
//! command line.
//!
//! A list directory contains:
//!
//! | File            | Content                                             |
//! |-----------------|-----------------------------------------------------|
//! | `emails`        | subscribed addresses, one per line                  |
//! | `.secret`       | random key of the tokens, generated on first load   |
//! | `signature.txt` | appended to every outbound body after `-- `         |
//! | `settings.json` | title, display name and language of the list        |

use std::{
    fs::OpenOptions,
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{error, info, trace, warn};
use rand::RngCore;

use crate::{
    errors::*,
    mail::Mail,
    messages::{Catalog, Language, MessageContext, MessageKey, Messages},
    subscribers::SubscriberStore,
    tickets::{Ticket, TicketStore},
    token::{hash_with_secret, Identity},
    with_carets, Configuration, Mailer, Request, Route,
};

const EMAILS_FILE: &str = "emails";
const SECRET_FILE: &str = ".secret";
const SIGNATURE_FILE: &str = "signature.txt";
const SETTINGS_FILE: &str = "settings.json";

/// User editable settings of a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Title of the newsletter, prefixed to subjects between brackets.
    pub title: String,
    /// Display name of the sender.
    pub display_name: String,
    /// Language of the notices.
    pub language: Language,
}

/// A newsletter: its identity, its list directory and its pending
/// broadcasts.
#[derive(Debug)]
pub struct Newsletter {
    identity: Identity,
    dir: PathBuf,
    secret: String,
    signature: String,
    settings: Settings,
    subscribers: SubscriberStore,
    tickets: TicketStore,
    throttle: Duration,
    ticket_retention: Option<Duration>,
}

impl Newsletter {
    /// Load the list stored in `dir`, creating the directory and the secret
    /// if needed.
    pub fn open(dir: impl Into<PathBuf>, identity: Identity) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create list directory {}.", dir.display()))?;

        let subscribers = SubscriberStore::open(dir.join(EMAILS_FILE))?;
        let signature = read_optional(&dir.join(SIGNATURE_FILE))?.unwrap_or_default();
        let settings = match read_optional(&dir.join(SETTINGS_FILE))? {
            Some(json) => serde_json::from_str(&json)?,
            None => Settings::default(),
        };
        let secret = match read_optional(&dir.join(SECRET_FILE))? {
            Some(secret) => secret.trim_end_matches(['\r', '\n']).to_string(),
            None => generate_secret(&dir.join(SECRET_FILE))?,
        };

        Ok(Self {
            identity,
            dir,
            secret,
            signature,
            settings,
            subscribers,
            tickets: TicketStore::default(),
            throttle: Duration::from_millis(200),
            ticket_retention: None,
        })
    }

    /// Load the list described by `conf`.
    pub fn from_config(conf: &Configuration, identity: Identity) -> Result<Self> {
        Ok(Self::open(conf.data_directory(), identity)?
            .with_tickets(TicketStore::new(conf.ticket_directory()))
            .with_throttle(conf.throttle())
            .with_ticket_retention(conf.ticket_retention()))
    }

    /// Keep pending broadcasts in `tickets`.
    pub fn with_tickets(mut self, tickets: TicketStore) -> Self {
        self.tickets = tickets;
        self
    }

    /// Wait `throttle` between two mails of a broadcast.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Purge pending broadcasts older than `retention` before creating one.
    pub fn with_ticket_retention(mut self, retention: Option<Duration>) -> Self {
        self.ticket_retention = retention;
        self
    }

    /// The local identity of the list.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The list directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Subscribed addresses.
    pub fn subscribers(&self) -> &[String] {
        self.subscribers.emails()
    }

    /// Whether `address` is subscribed.
    pub fn is_subscribed(&self, address: &str) -> bool {
        self.subscribers.contains(address)
    }

    /// Add `address` to the subscribers.
    pub fn subscribe(&mut self, address: &str) -> Result<()> {
        self.subscribers.subscribe(address)
    }

    /// Add `address` unless it is already subscribed, checking against the
    /// list on disk. Returns whether it was added.
    pub fn subscribe_if_absent(&mut self, address: &str) -> Result<bool> {
        self.subscribers.subscribe_if_absent(address)
    }

    /// Remove `address` from the subscribers.
    pub fn unsubscribe(&mut self, address: &str) -> Result<()> {
        self.subscribers.unsubscribe(address)
    }

    /// The pending broadcasts.
    pub fn tickets(&self) -> &TicketStore {
        &self.tickets
    }

    /// Whether `address` is the owner address.
    pub fn is_owner(&self, address: &str) -> bool {
        address == self.identity.owner_address()
    }

    /// Token of `input` keyed with the secret of the list.
    pub fn hash(&self, input: &str) -> String {
        hash_with_secret(input, &self.secret)
    }

    /// Token proving that `address` received our confirmation request.
    pub fn confirm_token(&self, address: &str) -> String {
        self.hash(address)
    }

    /// Replace and save the settings.
    pub fn save_settings(&mut self, settings: Settings) -> Result<()> {
        let path = self.dir.join(SETTINGS_FILE);
        let json = serde_json::to_string(&settings)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Could not write settings to {}.", path.display()))?;
        trace!("saved settings in {}.", path.display());
        self.settings = settings;
        Ok(())
    }

    /// Replace and save the signature.
    pub fn save_signature(&mut self, signature: String) -> Result<()> {
        let path = self.dir.join(SIGNATURE_FILE);
        std::fs::write(&path, &signature)
            .with_context(|| format!("Could not write signature to {}.", path.display()))?;
        trace!("saved signature in {}.", path.display());
        self.signature = signature;
        Ok(())
    }

    /// The catalog matching the language of the settings.
    pub fn messages(&self) -> Messages {
        Messages::new(self.settings.language)
    }

    /// Values available to message templates.
    pub fn message_context(&self) -> MessageContext {
        MessageContext {
            title: self.settings.title.clone(),
            local_user: self.identity.local_user.clone(),
            owner: self.identity.owner_address(),
            postmaster: self.identity.postmaster_address(),
            unsubscribe: self.identity.route_address(Route::Unsubscribe),
            subscribers: self.subscribers().len(),
        }
    }

    /// A mail from the owner with the list title and signature applied.
    pub fn default_mail(&self, subject: &str, body: &str) -> Mail {
        let subject = if self.settings.title.is_empty() {
            subject.to_string()
        } else {
            format!("[{}] {}", self.settings.title, subject)
        };
        let body = if self.signature.is_empty() {
            body.to_string()
        } else {
            format!("{}\n\n-- \n{}", body, self.signature)
        };
        Mail {
            from_address: self.identity.owner_address(),
            from_display_name: self.settings.display_name.clone(),
            list_unsubscribe: Some(self.identity.list_unsubscribe()),
            subject,
            body,
            ..Mail::default()
        }
    }

    /// A [`default_mail`](Self::default_mail) answering `request`.
    pub fn reply(&self, request: &Request, subject: &str, body: &str) -> Mail {
        Mail {
            to: request.from_address.clone(),
            in_reply_to: Some(with_carets(&request.message_id)),
            ..self.default_mail(subject, body)
        }
    }

    /// Save a pending broadcast, returning its token.
    pub fn create_ticket(&self, subject: &str, body: &str) -> Result<String> {
        if let Some(retention) = self.ticket_retention {
            if let Err(err) = self.tickets.purge_older_than(retention) {
                warn!("could not purge stale tickets: {err}");
            }
        }
        let token = self.hash(&format!("{body}{subject}"));
        self.tickets.write(
            &token,
            &Ticket {
                subject: subject.to_string(),
                body: body.to_string(),
            },
        )?;
        info!("created pending broadcast {token}.");
        Ok(token)
    }

    /// Retrieve the pending broadcast of `token`.
    pub fn read_ticket(&self, token: &str) -> Result<Ticket> {
        self.tickets.read(token)
    }

    /// The mail broadcast to every subscriber, with an unsubscription footer.
    pub fn broadcast_mail(&self, catalog: &dyn Catalog, subject: &str, body: &str) -> Result<Mail> {
        let mut mail = self.default_mail(subject, body);
        let footer = catalog.render(MessageKey::UnsubscribeFooter, &self.message_context())?;
        mail.body.push_str("\n\n");
        mail.body.push_str(&footer);
        Ok(mail)
    }

    /// The preview of the pending broadcast `token`, sent to the owner.
    /// Replying to it confirms the broadcast.
    pub fn preview_mail(
        &self,
        catalog: &dyn Catalog,
        token: &str,
        subject: &str,
        body: &str,
    ) -> Result<Mail> {
        let context = self.message_context();
        let mut mail = self.broadcast_mail(catalog, subject, body)?;
        mail.subject.push(' ');
        mail.subject
            .push_str(&catalog.render(MessageKey::PreviewSubjectSuffix, &context)?);
        mail.body.push_str("\n\n");
        mail.body
            .push_str(&catalog.render(MessageKey::PreviewTrailer, &context)?);
        mail.to = self.identity.owner_address();
        mail.id = Some(with_carets(&self.identity.generate_message_id(token)));
        mail.reply_to = Some(self.identity.route_address(Route::SendConfirm));
        Ok(mail)
    }

    /// Send `mail` to every subscriber in list order, waiting the throttle
    /// delay between two submissions. Failed submissions are logged and
    /// counted; there is no rollback.
    pub fn broadcast(&self, mailer: &dyn Mailer, mail: &Mail) -> Result<()> {
        let total = self.subscribers().len();
        let mut failed = 0;
        for (i, address) in self.subscribers().iter().enumerate() {
            if i > 0 && !self.throttle.is_zero() {
                std::thread::sleep(self.throttle);
            }
            let mail = Mail {
                to: address.clone(),
                ..mail.clone()
            };
            if let Err(err) = mailer.send(&mail) {
                error!("could not send newsletter to {address}: {err}");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(Error::Broadcast { failed, total });
        }
        info!("newsletter sent to all the {total} subscribers.");
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::from(err)
            .context(format!("Could not read {}.", path.display()))
            .into()),
    }
}

fn generate_secret(path: &Path) -> Result<String> {
    let mut key = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    let secret = data_encoding::BASE64.encode(&key);
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(0o600) // Read/write for owner only.
        .open(path)
        .with_context(|| format!("Could not create secret file {}.", path.display()))?;
    writeln!(file, "{secret}")
        .with_context(|| format!("Could not write secret to {}.", path.display()))?;
    info!("generated secret in {}.", path.display());
    Ok(secret)
}
