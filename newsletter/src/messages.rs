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

//! Localized messages sent by the controller.
//!
//! Every text the controller sends is identified by a [`MessageKey`] and
//! rendered by a [`Catalog`]. The default catalog, [`Messages`], holds one
//! [`minijinja`] template per key and per [`Language`]; templates see the
//! fields of [`MessageContext`].

use crate::errors::*;

/// Language of the messages sent to subscribers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// English, also used for unknown languages.
    #[default]
    English,
    /// French.
    French,
}

impl Language {
    /// Returns the ISO 639-1 code of the language.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
        }
    }

    /// Returns all possible variants as `&'static str`
    pub const fn possible_values() -> &'static [&'static str] {
        const VALUES: &[&str] = &[Language::English.as_str(), Language::French.as_str()];
        VALUES
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl From<Language> for String {
    fn from(l: Language) -> Self {
        l.as_str().to_string()
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            s if s.eq_ignore_ascii_case("en") || s.eq_ignore_ascii_case("english") => {
                Self::English
            }
            s if s.eq_ignore_ascii_case("fr") || s.eq_ignore_ascii_case("french") => Self::French,
            other => return Err(Error::new_external(format!("Invalid language: {other}."))),
        })
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

/// Identifies a message of the catalog.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// Subject of the reply to a subscription request from a subscriber.
    AlreadySubscribedSubject,
    /// Body of the reply to a subscription request from a subscriber.
    AlreadySubscribedBody,
    /// Subject of the confirmation request.
    ConfirmSubscriptionSubject,
    /// Body of the confirmation request.
    ConfirmSubscriptionBody,
    /// Subject of the subscription notice.
    SubscriptionSuccessSubject,
    /// Body of the subscription notice.
    SubscriptionSuccessBody,
    /// Subject of the unsubscription notice.
    UnsubscriptionSuccessSubject,
    /// Body of the unsubscription notice.
    UnsubscriptionSuccessBody,
    /// Subject of the unsubscription failure notice.
    UnsubscriptionFailedSubject,
    /// Body of the unsubscription failure notice.
    UnsubscriptionFailedBody,
    /// Body of the unsubscription failure notice when the sender was not
    /// subscribed.
    NotSubscribedBody,
    /// Subject of the verification failure notice.
    VerificationFailedSubject,
    /// Body of the verification failure notice.
    VerificationFailedBody,
    /// Footer of broadcast mails.
    UnsubscribeFooter,
    /// Suffix of the subject of preview mails.
    PreviewSubjectSuffix,
    /// Trailer of preview mails explaining how to confirm.
    PreviewTrailer,
}

/// Values available to message templates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageContext {
    /// Title of the newsletter, may be empty.
    pub title: String,
    /// Local user operating the newsletter.
    pub local_user: String,
    /// Owner address.
    pub owner: String,
    /// Postmaster address.
    pub postmaster: String,
    /// Unsubscription address.
    pub unsubscribe: String,
    /// Number of subscribers.
    pub subscribers: usize,
}

/// Source of the texts sent by the controller.
pub trait Catalog {
    /// Render the message `key` with `context`.
    fn render(&self, key: MessageKey, context: &MessageContext) -> Result<String>;
}

/// The built-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages {
    /// Language of the rendered messages.
    pub language: Language,
}

impl Messages {
    /// Create a catalog for `language`.
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    /// The template of `key` in `language`.
    pub const fn template(language: Language, key: MessageKey) -> &'static str {
        match language {
            Language::English => english(key),
            Language::French => french(key),
        }
    }
}

impl Catalog for Messages {
    fn render(&self, key: MessageKey, context: &MessageContext) -> Result<String> {
        let env = minijinja::Environment::new();
        Ok(env.render_named_str(
            "message",
            Self::template(self.language, key),
            context,
        )?)
    }
}

macro_rules! en_name {
    () => {
        "{% if title %}the newsletter [{{ title }}]{% else %}{{ local_user }}'s newsletter{% endif %}"
    };
}

macro_rules! fr_name {
    () => {
        "{% if title %}la newsletter [{{ title }}]{% else %}la newsletter de {{ local_user }}{% endif %}"
    };
}

const fn english(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        AlreadySubscribedSubject => "Already subscribed",
        AlreadySubscribedBody => {
            "Your email is already subscribed, if problem persists, contact <{{ postmaster }}>."
        }
        ConfirmSubscriptionSubject => "Please confirm your subscription",
        ConfirmSubscriptionBody => concat!(
            "Reply to this email to confirm that you want to subscribe to ",
            en_name!(),
            " (the content does not matter)."
        ),
        SubscriptionSuccessSubject => "Subscription is successful!",
        SubscriptionSuccessBody => concat!(
            "Your email has been successfully subscribed to ",
            en_name!(),
            "."
        ),
        UnsubscriptionSuccessSubject => "Unsubscription is successful",
        UnsubscriptionSuccessBody => concat!(
            "Your email has been successfully unsubscribed from ",
            en_name!(),
            "."
        ),
        UnsubscriptionFailedSubject => "Unsubscription failed",
        UnsubscriptionFailedBody => concat!(
            "Failed to unsubscribe your email from ",
            en_name!(),
            ". Contact list owner for more infos: <{{ owner }}>."
        ),
        NotSubscribedBody => concat!(
            "Your email is not subscribed to ",
            en_name!(),
            ". Contact list owner for more infos: <{{ owner }}>."
        ),
        VerificationFailedSubject => "Verification failed",
        VerificationFailedBody => {
            "Your email cannot be added to the subscribed list, contact list owner for more \
             infos: <{{ owner }}>."
        }
        UnsubscribeFooter => "To unsubscribe, send a mail to <{{ unsubscribe }}>",
        PreviewSubjectSuffix => "(preview)",
        PreviewTrailer => {
            "(this is a preview mail, if you want to confirm and send the newsletter to all the \
             {{ subscribers }} subscribers, reply to this email)"
        }
    }
}

const fn french(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        AlreadySubscribedSubject => "Déjà inscrit",
        AlreadySubscribedBody => {
            "Votre email est déjà inscrit, si le problème persiste, contactez <{{ postmaster }}>."
        }
        ConfirmSubscriptionSubject => "Veuillez confirmer votre inscription",
        ConfirmSubscriptionBody => concat!(
            "Répondez à cet email pour confirmer que vous souhaitez vous inscrire à ",
            fr_name!(),
            " (le contenu n'a pas d'importance)."
        ),
        SubscriptionSuccessSubject => "Inscription réussie !",
        SubscriptionSuccessBody => concat!("Votre email a bien été inscrit à ", fr_name!(), "."),
        UnsubscriptionSuccessSubject => "Désinscription réussie",
        UnsubscriptionSuccessBody => {
            concat!("Votre email a bien été désinscrit de ", fr_name!(), ".")
        }
        UnsubscriptionFailedSubject => "Échec de la désinscription",
        UnsubscriptionFailedBody => concat!(
            "La désinscription de votre email à ",
            fr_name!(),
            " a échoué. Contactez le propriétaire de la liste pour plus d'infos : <{{ owner }}>."
        ),
        NotSubscribedBody => concat!(
            "Votre email n'est pas inscrit à ",
            fr_name!(),
            ". Contactez le propriétaire de la liste pour plus d'infos : <{{ owner }}>."
        ),
        VerificationFailedSubject => "Échec de la vérification",
        VerificationFailedBody => {
            "Votre email ne peut pas être inscrit à la liste, veuillez contacter le propriétaire \
             de la liste pour plus d'infos : <{{ owner }}>."
        }
        UnsubscribeFooter => "Pour vous désinscrire, envoyez un mail à <{{ unsubscribe }}>",
        PreviewSubjectSuffix => "(aperçu)",
        PreviewTrailer => {
            "(ceci est un mail d'aperçu, pour confirmer et envoyer la newsletter aux \
             {{ subscribers }} inscrits, répondez à cet email)"
        }
    }
}
