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

//! Errors of this library.

pub use crate::anyhow::Context;

use thiserror::Error;

/// Newsletter library error.
#[derive(Error, Debug)]
pub enum Error {
    /// The address is not present in the subscriber list.
    #[error("Address {0} is not subscribed.")]
    NotSubscribed(String),
    /// The confirmation token of a reply did not match the sender address.
    #[error("Verification of the confirmation token failed for {0}.")]
    VerificationFailed(String),
    /// A required header was absent from the inbound message.
    #[error("Missing {0} header.")]
    MissingHeader(&'static str),
    /// A Message-ID was not of the form generated by this list.
    #[error("Message ID {0:?} doesn't match the generated ID form.")]
    MalformedId(String),
    /// The sender is not allowed to use this route.
    #[error("Sender {0} is not the list owner.")]
    Unauthorized(String),
    /// No pending broadcast matches this token.
    #[error("No pending broadcast matches token {0}.")]
    TicketNotFound(String),
    /// The mailer failed to submit a message.
    #[error("Could not send mail to {to}: {source}")]
    MailSend {
        /// Recipient of the failed submission.
        to: String,
        /// Underlying mailer failure.
        #[source]
        source: Box<Error>,
    },
    /// Some recipients of a broadcast could not be reached.
    #[error("Error occurred while sending mail to {failed} of {total} addresses.")]
    Broadcast {
        /// Failed submissions.
        failed: usize,
        /// Attempted submissions.
        total: usize,
    },
    /// Unknown route name.
    #[error("Invalid route name: {0}.")]
    InvalidRoute(String),

    /// Error returned from an external user initiated operation such as
    /// deserialization or I/O.
    #[error("{0:#}")]
    External(#[from] anyhow::Error),
    /// Error returned from internal I/O operations.
    #[error("Error returned from internal I/O operations: {0}")]
    Io(#[from] ::std::io::Error),
    /// Error returned while parsing an inbound message.
    #[error("Could not parse e-mail: {0}")]
    Parse(#[from] mailparse::MailParseError),
    /// Error returned from e-mail protocol operations from `melib` crate.
    #[error("Error returned from e-mail protocol operations from `melib` crate: {0}")]
    Melib(#[from] melib::error::Error),
    /// Error from (de)serializing JSON values.
    #[error("Error from deserializing JSON values: {0}")]
    SerdeJson(#[from] serde_json::Error),
    /// Error from deserializing TOML values.
    #[error("Error from deserializing TOML values: {0}")]
    Toml(#[from] toml::de::Error),
    /// Error returned from minijinja template engine.
    #[error("Error returned from minijinja template engine: {0}")]
    Template(#[from] minijinja::Error),
}

impl Error {
    /// Helper function to create a new generic error message.
    pub fn new_external<S: Into<String>>(msg: S) -> Self {
        let msg = msg.into();
        Self::External(anyhow::Error::msg(msg))
    }

    /// Wrap a mailer failure for recipient `to`.
    pub fn mail_send(to: impl Into<String>, source: Self) -> Self {
        Self::MailSend {
            to: to.into(),
            source: Box::new(source),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::External(anyhow::Error::msg(s))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::External(anyhow::Error::msg(s.to_string()))
    }
}

/// Type alias for newsletter library Results.
pub type Result<T> = std::result::Result<T, Error>;
