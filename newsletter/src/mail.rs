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

//! Outbound messages.

use std::borrow::Cow;

use crate::{encode_header, errors::*, with_carets};

/// An e-mail to send.
///
/// Message identifiers (`id`, `in_reply_to`) are stored with their carets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mail {
    /// Sender address.
    pub from_address: String,
    /// Sender display name, may be empty.
    pub from_display_name: String,
    /// Recipient address.
    pub to: String,
    /// `Message-Id` header. Generated at rendering when absent.
    pub id: Option<String>,
    /// `In-Reply-To` header.
    pub in_reply_to: Option<String>,
    /// `Reply-To` header.
    pub reply_to: Option<String>,
    /// `List-Unsubscribe` header.
    pub list_unsubscribe: Option<String>,
    /// Subject, unencoded.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl Mail {
    /// Value of the `From` header.
    pub fn from(&self) -> String {
        let name = self.from_display_name.trim();
        if name.is_empty() {
            return self.from_address.clone();
        }
        match encode_header(name) {
            Cow::Borrowed(name) => {
                format!(
                    "\"{}\" <{}>",
                    name.replace('\\', "\\\\").replace('"', "\\\""),
                    self.from_address
                )
            }
            Cow::Owned(encoded) => format!("{encoded} <{}>", self.from_address),
        }
    }

    /// Domain of the sender address.
    fn domain(&self) -> &str {
        self.from_address
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain)
    }

    /// Render the message as RFC 5322 text with CRLF line endings and a
    /// quoted-printable body.
    pub fn to_rfc5322(&self) -> Result<String> {
        if self.to.trim().is_empty() {
            return Err(Error::new_external(format!(
                "Mail {:?} has no recipient.",
                self.subject
            )));
        }
        let message_id = match self.id.as_deref() {
            Some(id) => with_carets(id),
            None => format!(
                "<{}.{:016x}@{}>",
                chrono::Utc::now().timestamp(),
                rand::random::<u64>(),
                self.domain()
            ),
        };

        let mut headers: Vec<(&str, Cow<'_, str>)> = vec![
            ("Date", chrono::Local::now().to_rfc2822().into()),
            ("From", self.from().into()),
            ("To", self.to.as_str().into()),
            ("Subject", encode_header(&self.subject)),
            ("Message-Id", message_id.into()),
        ];
        if let Some(in_reply_to) = self.in_reply_to.as_deref() {
            headers.push(("In-Reply-To", with_carets(in_reply_to).into()));
        }
        if let Some(reply_to) = self.reply_to.as_deref() {
            headers.push(("Reply-To", reply_to.into()));
        }
        if let Some(list_unsubscribe) = self.list_unsubscribe.as_deref() {
            headers.push(("List-Unsubscribe", list_unsubscribe.into()));
        }
        headers.push(("MIME-Version", "1.0".into()));
        headers.push(("Content-Type", "text/plain; charset=UTF-8".into()));
        headers.push(("Content-Transfer-Encoding", "quoted-printable".into()));

        let mut ret = String::new();
        for (name, value) in headers {
            ret.push_str(name);
            ret.push_str(": ");
            ret.push_str(&value);
            ret.push_str("\r\n");
        }
        ret.push_str("\r\n");
        let body = self.body.replace("\r\n", "\n").replace('\n', "\r\n");
        ret.push_str(&quoted_printable::encode_to_str(body));
        ret.push_str("\r\n");
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use mailparse::{parse_mail, MailHeaderMap};

    use super::*;

    fn sample() -> Mail {
        Mail {
            from_address: "user@club1.fr".into(),
            from_display_name: "Display Name".into(),
            to: "recipient@club1.fr".into(),
            id: Some("<user-TOKEN@club1.fr>".into()),
            in_reply_to: Some("<abc@example.com>".into()),
            reply_to: Some("user+subscribe-confirm@club1.fr".into()),
            list_unsubscribe: Some("<mailto:user+unsubscribe@club1.fr>".into()),
            subject: "[Title] Déjà inscrit".into(),
            body: "First line\nCafé = coffee\n\n-- \nBye bye".into(),
        }
    }

    #[test]
    fn test_from() {
        let mut mail = sample();
        assert_eq!(mail.from(), "\"Display Name\" <user@club1.fr>");
        mail.from_display_name = String::new();
        assert_eq!(mail.from(), "user@club1.fr");
        mail.from_display_name = "Zoé".into();
        assert_eq!(mail.from(), "=?UTF-8?B?Wm/DqQ==?= <user@club1.fr>");
    }

    #[test]
    fn test_render() {
        let mail = sample();
        let rendered = mail.to_rfc5322().unwrap();
        assert!(rendered.is_ascii());
        let parsed = parse_mail(rendered.as_bytes()).unwrap();
        let header = |name: &str| parsed.headers.get_first_value(name).unwrap();
        assert_eq!(header("To"), "recipient@club1.fr");
        assert_eq!(header("Subject"), "[Title] Déjà inscrit");
        assert_eq!(header("Message-Id"), "<user-TOKEN@club1.fr>");
        assert_eq!(header("In-Reply-To"), "<abc@example.com>");
        assert_eq!(header("Reply-To"), "user+subscribe-confirm@club1.fr");
        assert_eq!(
            header("List-Unsubscribe"),
            "<mailto:user+unsubscribe@club1.fr>"
        );
        assert_eq!(header("MIME-Version"), "1.0");
        assert!(parsed.headers.get_first_value("Date").is_some());
        let body = parsed.get_body().unwrap();
        assert_eq!(
            body.lines().map(str::trim_end).collect::<Vec<_>>(),
            mail.body.lines().map(str::trim_end).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_render_optional_headers() {
        let mail = Mail {
            id: None,
            in_reply_to: None,
            reply_to: None,
            list_unsubscribe: None,
            ..sample()
        };
        let rendered = mail.to_rfc5322().unwrap();
        let parsed = parse_mail(rendered.as_bytes()).unwrap();
        let id = parsed.headers.get_first_value("Message-Id").unwrap();
        assert!(id.starts_with('<') && id.ends_with("@club1.fr>"), "{id}");
        assert!(parsed.headers.get_first_value("In-Reply-To").is_none());
        assert!(parsed.headers.get_first_value("Reply-To").is_none());
        assert!(parsed.headers.get_first_value("List-Unsubscribe").is_none());
    }

    #[test]
    fn test_render_without_recipient() {
        let mail = Mail {
            to: String::new(),
            ..sample()
        };
        assert!(matches!(mail.to_rfc5322(), Err(Error::External(_))));
    }
}
