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

//! Verification tokens and the addresses of a newsletter.
//!
//! A token is the base32 encoded SHA-256 digest of some input followed by the
//! secret of the list. Tokens travel inside Message-IDs of the form
//! `LOCALUSER-TOKEN@HOSTNAME`: we put one in the Message-ID of a reply, and
//! get it back in the `In-Reply-To` header of the answer.

use sha2::{Digest, Sha256};

use crate::{errors::*, Route, StripCarets};

/// Compute the token of `input` keyed with `secret`.
pub fn hash_with_secret(input: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.update(secret.as_bytes());
    data_encoding::BASE32.encode(&hasher.finalize())
}

/// Whether `token` only contains characters of the token alphabet.
pub fn is_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b) || b == b'=')
}

/// The local account a newsletter is operated from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    /// Local user name, the local part of the owner address.
    pub local_user: String,
    /// Host name, the domain of the owner address.
    pub hostname: String,
}

impl Identity {
    /// Create a new identity.
    pub fn new(local_user: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            local_user: local_user.into(),
            hostname: hostname.into(),
        }
    }

    /// Address of the list owner, the only one allowed to broadcast.
    pub fn owner_address(&self) -> String {
        format!("{}@{}", self.local_user, self.hostname)
    }

    /// Address of the postmaster of the host.
    pub fn postmaster_address(&self) -> String {
        format!("postmaster@{}", self.hostname)
    }

    /// Sub-address delivering to `route`.
    pub fn route_address(&self, route: Route) -> String {
        format!("{}+{}@{}", self.local_user, route, self.hostname)
    }

    /// Value of the `List-Unsubscribe` header.
    pub fn list_unsubscribe(&self) -> String {
        format!("<mailto:{}>", self.route_address(Route::Unsubscribe))
    }

    /// Message-ID (without carets) carrying `token`.
    pub fn generate_message_id(&self, token: &str) -> String {
        format!("{}-{}@{}", self.local_user, token, self.hostname)
    }

    /// Retrieve the token of a Message-ID generated by
    /// [`Identity::generate_message_id`]. Carets are optional.
    pub fn extract_token(&self, message_id: &str) -> Result<String> {
        let malformed = || Error::MalformedId(message_id.to_string());
        let token = message_id
            .strip_carets()
            .strip_prefix(format!("{}-", self.local_user).as_str())
            .and_then(|rest| rest.strip_suffix(format!("@{}", self.hostname).as_str()))
            .ok_or_else(malformed)?;
        if !is_token(token) {
            return Err(malformed());
        }
        Ok(token.to_string())
    }
}
