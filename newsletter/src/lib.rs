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

#![deny(
    missing_docs,
    rustdoc::broken_intra_doc_links,
    /* groups */
    clippy::correctness,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::style,
    clippy::cargo,
    clippy::nursery,
    /* restriction */
    clippy::dbg_macro,
    clippy::rc_buffer,
    clippy::as_underscore,
    clippy::assertions_on_result_states,
    /* pedantic */
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::ptr_as_ptr,
    clippy::bool_to_int_with_if,
    clippy::borrow_as_ptr,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_ptr_alignment,
    clippy::naive_bytecount
)]
#![allow(clippy::multiple_crate_versions, clippy::missing_const_for_fn)]

//! Mail-driven newsletter manager library.
//!
//! A newsletter is operated on behalf of a single local user, the *owner*.
//! Everything happens by e-mail: the MTA delivers messages sent to
//! `owner+ROUTE@host` to the [`Controller`], which runs the route and replies.
//!
//! | Route               | Sent by     | Effect                                    |
//! |---------------------|-------------|-------------------------------------------|
//! | `subscribe`         | anyone      | reply with a confirmation request         |
//! | `subscribe-confirm` | anyone      | verify the reply token and subscribe      |
//! | `unsubscribe`       | anyone      | remove the sender from the list           |
//! | `send`              | owner       | store a pending broadcast, mail a preview |
//! | `send-confirm`      | owner       | broadcast the pending message             |
//!
//! No state is kept between the request and the confirmation: the token
//! embedded in the Message-ID of our reply is recomputed from the secret of
//! the list and compared with the `In-Reply-To` header of the confirmation.
//!
//! # Example
//!
//! ```
//! use newsletter::{mail::Mail, Controller, Identity, Newsletter, Outcome, Route};
//! # use tempfile::TempDir;
//! # use std::cell::RefCell;
//!
//! # struct Outbox(RefCell<Vec<Mail>>);
//! # impl newsletter::Mailer for Outbox {
//! #     fn send(&self, mail: &Mail) -> newsletter::Result<()> {
//! #         self.0.borrow_mut().push(mail.clone());
//! #         Ok(())
//! #     }
//! # }
//! # fn do_test() -> newsletter::Result<()> {
//! # let tmp_dir = TempDir::new().unwrap();
//! let identity = Identity::new("news", "example.com");
//! let list = Newsletter::open(tmp_dir.path(), identity)?;
//! let mut controller = Controller::new(list, Outbox(RefCell::new(vec![])));
//!
//! let request = b"From: Name <user@example.com>
//! To: <news+subscribe@example.com>
//! Subject: subscribe
//! Message-ID: <1@example.com>
//!
//! ";
//! assert_eq!(controller.handle(Route::Subscribe, request)?, Outcome::Done);
//! // We have not subscribed yet: the reply must be confirmed first.
//! assert!(controller.newsletter().subscribers().is_empty());
//! # Ok(())
//! # }
//! # do_test().unwrap();
//! ```

/// Error library
pub extern crate anyhow;
/// Date library
pub extern crate chrono;

/// Serde
#[macro_use]
pub extern crate serde;
/// Log
pub extern crate log;
/// melib
pub extern crate melib;

mod config;
pub mod controller;
mod errors;
pub mod list;
pub mod mail;
pub mod mailer;
pub mod messages;
pub mod request;
pub mod subscribers;
pub mod tickets;
pub mod token;

pub use config::{Configuration, SendMail};
pub use controller::{Controller, Outcome, Route};
pub use errors::*;
pub use list::{Newsletter, Settings};
pub use mailer::Mailer;
pub use messages::{Catalog, Language, MessageKey, Messages};
pub use request::Request;
pub use token::Identity;

/// Trait for stripping carets ('<','>') from Message IDs.
pub trait StripCarets {
    /// If `self` is surrounded by carets, strip them.
    fn strip_carets(&self) -> &str;
}

impl StripCarets for &str {
    fn strip_carets(&self) -> &str {
        let mut self_ref = self.trim();
        if self_ref.starts_with('<') && self_ref.ends_with('>') {
            self_ref = &self_ref[1..self_ref.len().saturating_sub(1)];
        }
        self_ref
    }
}

/// Surround a Message ID with carets unless it already is.
pub fn with_carets(id: &str) -> String {
    let id = id.trim();
    if id.starts_with('<') && id.ends_with('>') {
        id.to_string()
    } else {
        format!("<{id}>")
    }
}

mod helpers {
    use std::borrow::Cow;

    /* RFC2047: each line of a header field that contains one or more 'encoded-word's is
     * limited to 76 characters, so chunks of at most 45 bytes are encoded separately. */
    const ENCODED_WORD_MAX_INPUT: usize = 45;

    /// Ensure `value` is in appropriate representation to be a header value.
    ///
    /// Values that are not printable ASCII are turned into a sequence of
    /// `UTF-8` base64 encoded words, split on character boundaries.
    pub fn encode_header(value: &'_ str) -> Cow<'_, str> {
        if value.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Cow::Borrowed(value);
        }
        let mut words = vec![];
        let mut window_start = 0;
        for (idx, c) in value.char_indices() {
            if idx + c.len_utf8() - window_start > ENCODED_WORD_MAX_INPUT {
                words.push(encoded_word(&value[window_start..idx]));
                window_start = idx;
            }
        }
        words.push(encoded_word(&value[window_start..]));
        Cow::Owned(words.join(" "))
    }

    fn encoded_word(chunk: &str) -> String {
        format!(
            "=?UTF-8?B?{}?=",
            data_encoding::BASE64.encode(chunk.as_bytes())
        )
    }

    #[cfg(test)]
    mod tests {
        use super::encode_header;

        #[test]
        fn test_encode_header_ascii_is_borrowed() {
            assert!(matches!(
                encode_header("Hello world"),
                std::borrow::Cow::Borrowed("Hello world")
            ));
        }

        #[test]
        fn test_encode_header_non_ascii() {
            for value in [
                "Déjà inscrit",
                "Échec de la désinscription à la newsletter [Très longue liste]",
            ] {
                let encoded = encode_header(value);
                assert!(encoded.starts_with("=?UTF-8?B?"), "{encoded}");
                assert!(encoded.is_ascii());
                assert!(encoded.split(' ').all(|word| word.len() <= 75), "{encoded}");
                let decoded = mailparse::parse_header(format!("Subject: {encoded}").as_bytes())
                    .unwrap()
                    .0
                    .get_value();
                assert_eq!(decoded, value);
            }
        }
    }
}

pub use helpers::*;
