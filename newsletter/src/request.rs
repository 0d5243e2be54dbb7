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

//! Inbound messages.

use mailparse::{addrparse_header, parse_mail, MailAddr, MailHeaderMap, ParsedMail};

use crate::{errors::*, StripCarets};

/// An e-mail received by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Address of the first `From` mailbox.
    pub from_address: String,
    /// Display name of the first `From` mailbox, if any.
    pub from_name: Option<String>,
    /// `Message-ID` header, without carets.
    pub message_id: String,
    /// First message identifier of the `In-Reply-To` header, without carets.
    pub in_reply_to: Option<String>,
    /// Decoded `Subject` header.
    pub subject: String,
    /// Text of the first `text/plain` part.
    pub body: String,
}

impl Request {
    /// Parse a raw RFC 5322 message.
    ///
    /// Fails with [`Error::MissingHeader`] when `From` or `Message-ID` are
    /// absent or empty.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mail = parse_mail(raw)?;

        let from_header = mail
            .headers
            .get_first_header("From")
            .ok_or(Error::MissingHeader("From"))?;
        let (from_address, from_name) = addrparse_header(from_header)
            .ok()
            .and_then(|list| {
                list.iter().find_map(|addr| match addr {
                    MailAddr::Single(info) => Some((info.addr.clone(), info.display_name.clone())),
                    MailAddr::Group(group) => group
                        .addrs
                        .first()
                        .map(|info| (info.addr.clone(), info.display_name.clone())),
                })
            })
            .filter(|(addr, _)| !addr.trim().is_empty())
            .ok_or(Error::MissingHeader("From"))?;

        let message_id = mail
            .headers
            .get_first_value("Message-ID")
            .map(|id| id.as_str().strip_carets().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingHeader("Message-ID"))?;

        let in_reply_to = mail
            .headers
            .get_first_value("In-Reply-To")
            .and_then(|value| first_msg_id(&value));

        let subject = mail
            .headers
            .get_first_value("Subject")
            .unwrap_or_default()
            .trim()
            .to_string();

        let body = text_body(&mail)?.unwrap_or_default();

        Ok(Self {
            from_address: from_address.trim().to_string(),
            from_name: from_name.filter(|n| !n.trim().is_empty()),
            message_id,
            in_reply_to,
            subject,
            body,
        })
    }
}

/// First `<...>` identifier of a list of message identifiers, or the whole
/// value if it has no carets.
fn first_msg_id(value: &str) -> Option<String> {
    let value = value.trim();
    let id = match (value.find('<'), value.find('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value.split_whitespace().next().unwrap_or_default(),
    };
    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Text of the first `text/plain` part of `mail`.
fn text_body(mail: &ParsedMail) -> Result<Option<String>> {
    let mimetype = mail.ctype.mimetype.to_ascii_lowercase();
    if mimetype.starts_with("multipart/") {
        for part in &mail.subparts {
            if let Some(body) = text_body(part)? {
                return Ok(Some(body));
            }
        }
        return Ok(None);
    }
    if mimetype == "text/plain" {
        return Ok(Some(mail.get_body()?));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let raw = b"From: Jean Dupont <jean@example.com>\r
To: <user+subscribe@club1.fr>\r
Subject: Hello\r
Message-ID: <abc@example.com>\r
In-Reply-To: <user-TOKEN@club1.fr>\r
\r
Body text";
        let request = Request::parse(raw).unwrap();
        assert_eq!(
            request,
            Request {
                from_address: "jean@example.com".into(),
                from_name: Some("Jean Dupont".into()),
                message_id: "abc@example.com".into(),
                in_reply_to: Some("user-TOKEN@club1.fr".into()),
                subject: "Hello".into(),
                body: "Body text".into(),
            }
        );
    }

    #[test]
    fn test_parse_missing_headers() {
        let no_from = b"Subject: x\nMessage-ID: <1@example.com>\n\nbody";
        assert!(matches!(
            Request::parse(no_from),
            Err(Error::MissingHeader("From"))
        ));
        let empty_from = b"From: \nSubject: x\nMessage-ID: <1@example.com>\n\nbody";
        assert!(matches!(
            Request::parse(empty_from),
            Err(Error::MissingHeader("From"))
        ));
        let no_id = b"From: a@example.com\nSubject: x\n\nbody";
        assert!(matches!(
            Request::parse(no_id),
            Err(Error::MissingHeader("Message-ID"))
        ));
    }

    #[test]
    fn test_parse_optional_headers() {
        let raw = b"From: a@example.com\nMessage-ID: <1@example.com>\n\n";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.from_address, "a@example.com");
        assert_eq!(request.from_name, None);
        assert_eq!(request.in_reply_to, None);
        assert_eq!(request.subject, "");
        assert_eq!(request.body, "");
    }

    #[test]
    fn test_in_reply_to_first_id() {
        assert_eq!(
            first_msg_id("<first@example.com> <second@example.com>").as_deref(),
            Some("first@example.com")
        );
        assert_eq!(
            first_msg_id(" bare@example.com ").as_deref(),
            Some("bare@example.com")
        );
        assert_eq!(first_msg_id("   "), None);
        assert_eq!(first_msg_id("<>"), None);
    }

    #[test]
    fn test_multipart_body() {
        let raw = b"From: a@example.com\r
Message-ID: <1@example.com>\r
Subject: =?UTF-8?B?RMOpasOgIGluc2NyaXQ=?=\r
MIME-Version: 1.0\r
Content-Type: multipart/alternative; boundary=\"XX\"\r
\r
--XX\r
Content-Type: text/html; charset=utf-8\r
\r
<p>html</p>\r
--XX\r
Content-Type: text/plain; charset=utf-8\r
Content-Transfer-Encoding: quoted-printable\r
\r
caf=C3=A9\r
--XX--\r
";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.subject, "Déjà inscrit");
        assert_eq!(request.body.trim_end(), "café");
    }
}
