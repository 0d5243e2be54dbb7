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

//! # Routes
//!
//! The [`Controller`] runs one [`Route`] on one inbound message and returns.
//! Confirmations are stateless: a route that needs one replies with a
//! Message-ID carrying a token, and the confirming route recomputes the token
//! from its own inputs and compares it with the `In-Reply-To` header of the
//! answer.

use log::{error, info, warn};

use crate::{
    errors::*,
    mail::Mail,
    messages::{Catalog, MessageKey},
    with_carets, Mailer, Newsletter, Request,
};

/// Operations reachable by e-mail, named after the sub-address they are
/// delivered to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    /// Ask for a subscription. Anyone can use it.
    Subscribe,
    /// Confirm a subscription by replying to the confirmation request.
    SubscribeConfirm,
    /// Leave the list. Anyone can use it.
    Unsubscribe,
    /// Submit a newsletter. Owner only.
    Send,
    /// Confirm a newsletter by replying to its preview. Owner only.
    SendConfirm,
}

impl std::str::FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            s if s.eq_ignore_ascii_case(Self::Subscribe.as_str()) => Self::Subscribe,
            s if s.eq_ignore_ascii_case(Self::SubscribeConfirm.as_str()) => {
                Self::SubscribeConfirm
            }
            s if s.eq_ignore_ascii_case(Self::Unsubscribe.as_str()) => Self::Unsubscribe,
            s if s.eq_ignore_ascii_case(Self::Send.as_str()) => Self::Send,
            s if s.eq_ignore_ascii_case(Self::SendConfirm.as_str()) => Self::SendConfirm,
            other => return Err(Error::InvalidRoute(other.to_string())),
        })
    }
}

impl Route {
    /// Returns the sub-address of the route.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::SubscribeConfirm => "subscribe-confirm",
            Self::Unsubscribe => "unsubscribe",
            Self::Send => "send",
            Self::SendConfirm => "send-confirm",
        }
    }

    /// Returns all possible variants as `&'static str`
    pub const fn possible_values() -> &'static [&'static str] {
        const VALUES: &[&str] = &[
            Route::Subscribe.as_str(),
            Route::SubscribeConfirm.as_str(),
            Route::Unsubscribe.as_str(),
            Route::Send.as_str(),
            Route::SendConfirm.as_str(),
        ];
        VALUES
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

/// Successful result of a route.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Outcome {
    /// The route did its job.
    Done,
    /// The sender was already subscribed; they were told so and nothing
    /// changed.
    AlreadySubscribed,
}

/// Log prefix of an invocation.
struct Scope<'a> {
    route: Route,
    from: &'a str,
}

impl std::fmt::Display for Scope<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "route {:?} from {:?}", self.route.as_str(), self.from)
    }
}

/// Runs routes against a [`Newsletter`], replying through a [`Mailer`].
pub struct Controller<M: Mailer> {
    newsletter: Newsletter,
    mailer: M,
    catalog: Box<dyn Catalog>,
}

impl<M: Mailer> Controller<M> {
    /// Create a controller using the catalog of the list language.
    pub fn new(newsletter: Newsletter, mailer: M) -> Self {
        let catalog = Box::new(newsletter.messages());
        Self {
            newsletter,
            mailer,
            catalog,
        }
    }

    /// Replace the message catalog.
    pub fn with_catalog(mut self, catalog: impl Catalog + 'static) -> Self {
        self.catalog = Box::new(catalog);
        self
    }

    /// The newsletter.
    pub fn newsletter(&self) -> &Newsletter {
        &self.newsletter
    }

    /// The mailer.
    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Parse the raw message `raw` and run `route` on it.
    pub fn handle(&mut self, route: Route, raw: &[u8]) -> Result<Outcome> {
        let request = match Request::parse(raw) {
            Ok(request) => request,
            Err(err) => {
                error!("route {:?}: could not parse e-mail: {err}", route.as_str());
                return Err(err);
            }
        };
        self.handle_request(route, &request)
    }

    /// Run `route` on an already parsed `request`.
    pub fn handle_request(&mut self, route: Route, request: &Request) -> Result<Outcome> {
        let scope = Scope {
            route,
            from: &request.from_address,
        };
        let result = match route {
            Route::Subscribe => self.subscribe(&scope, request),
            Route::SubscribeConfirm => self.subscribe_confirm(&scope, request),
            Route::Unsubscribe => self.unsubscribe(&scope, request),
            Route::Send => self.send(&scope, request),
            Route::SendConfirm => self.send_confirm(&scope, request),
        };
        if let Err(err) = &result {
            error!("{scope}: {err}");
        }
        result
    }

    fn subscribe(&mut self, scope: &Scope, req: &Request) -> Result<Outcome> {
        if self.newsletter.is_subscribed(&req.from_address) {
            return Ok(self.already_subscribed(scope, req));
        }
        let body = self.render(MessageKey::ConfirmSubscriptionBody)?;
        let subject = self.render(MessageKey::ConfirmSubscriptionSubject)?;
        let identity = self.newsletter.identity();
        let token = self.newsletter.confirm_token(&req.from_address);
        let mail = Mail {
            reply_to: Some(identity.route_address(Route::SubscribeConfirm)),
            id: Some(with_carets(&identity.generate_message_id(&token))),
            ..self.newsletter.reply(req, &subject, &body)
        };
        self.mailer
            .send(&mail)
            .map_err(|err| Error::mail_send(&req.from_address, err))?;
        info!("{scope}: subscription confirmation mail sent.");
        Ok(Outcome::Done)
    }

    fn subscribe_confirm(&mut self, scope: &Scope, req: &Request) -> Result<Outcome> {
        if self.newsletter.is_subscribed(&req.from_address) {
            return Ok(self.already_subscribed(scope, req));
        }
        let in_reply_to = req
            .in_reply_to
            .as_deref()
            .ok_or(Error::MissingHeader("In-Reply-To"))?;
        let verified = match self.newsletter.identity().extract_token(in_reply_to) {
            Ok(token) => {
                if token == self.newsletter.confirm_token(&req.from_address) {
                    Ok(())
                } else {
                    Err(Error::VerificationFailed(req.from_address.clone()))
                }
            }
            Err(err) => Err(err),
        };
        if let Err(err) = verified {
            self.notify(
                scope,
                req,
                MessageKey::VerificationFailedSubject,
                MessageKey::VerificationFailedBody,
            );
            return Err(err);
        }

        if !self.newsletter.subscribe_if_absent(&req.from_address)? {
            return Ok(self.already_subscribed(scope, req));
        }
        info!("{scope}: address has been added to subscribers.");
        self.notify(
            scope,
            req,
            MessageKey::SubscriptionSuccessSubject,
            MessageKey::SubscriptionSuccessBody,
        );
        Ok(Outcome::Done)
    }

    fn unsubscribe(&mut self, scope: &Scope, req: &Request) -> Result<Outcome> {
        match self.newsletter.unsubscribe(&req.from_address) {
            Ok(()) => {
                info!("{scope}: address removed from subscribers.");
                self.notify(
                    scope,
                    req,
                    MessageKey::UnsubscriptionSuccessSubject,
                    MessageKey::UnsubscriptionSuccessBody,
                );
                Ok(Outcome::Done)
            }
            Err(err @ Error::NotSubscribed(_)) => {
                warn!("{scope}: address is not subscribed.");
                self.notify(
                    scope,
                    req,
                    MessageKey::UnsubscriptionFailedSubject,
                    MessageKey::NotSubscribedBody,
                );
                Err(err)
            }
            Err(err) => {
                self.notify(
                    scope,
                    req,
                    MessageKey::UnsubscriptionFailedSubject,
                    MessageKey::UnsubscriptionFailedBody,
                );
                Err(err)
            }
        }
    }

    fn send(&mut self, scope: &Scope, req: &Request) -> Result<Outcome> {
        if !self.newsletter.is_owner(&req.from_address) {
            return Err(Error::Unauthorized(req.from_address.clone()));
        }
        let token = self.newsletter.create_ticket(&req.subject, &req.body)?;
        let mail =
            self.newsletter
                .preview_mail(&*self.catalog, &token, &req.subject, &req.body)?;
        self.mailer
            .send(&mail)
            .map_err(|err| Error::mail_send(&mail.to, err))?;
        info!("{scope}: preview mail sent to {}.", mail.to);
        Ok(Outcome::Done)
    }

    fn send_confirm(&mut self, scope: &Scope, req: &Request) -> Result<Outcome> {
        if !self.newsletter.is_owner(&req.from_address) {
            return Err(Error::Unauthorized(req.from_address.clone()));
        }
        let in_reply_to = req
            .in_reply_to
            .as_deref()
            .ok_or(Error::MissingHeader("In-Reply-To"))?;
        let token = self.newsletter.identity().extract_token(in_reply_to)?;
        let ticket = self.newsletter.read_ticket(&token)?;
        let mail =
            self.newsletter
                .broadcast_mail(&*self.catalog, &ticket.subject, &ticket.body)?;
        self.newsletter.broadcast(&self.mailer, &mail)?;
        info!(
            "{scope}: newsletter sent to all the {} subscribers.",
            self.newsletter.subscribers().len()
        );
        Ok(Outcome::Done)
    }

    fn already_subscribed(&self, scope: &Scope, req: &Request) -> Outcome {
        warn!("{scope}: address is already subscribed.");
        self.notify(
            scope,
            req,
            MessageKey::AlreadySubscribedSubject,
            MessageKey::AlreadySubscribedBody,
        );
        Outcome::AlreadySubscribed
    }

    fn render(&self, key: MessageKey) -> Result<String> {
        self.catalog
            .render(key, &self.newsletter.message_context())
    }

    /// Reply to `req` with a notice. Failures are logged only.
    fn notify(&self, scope: &Scope, req: &Request, subject: MessageKey, body: MessageKey) {
        let mail = match (self.render(subject), self.render(body)) {
            (Ok(subject), Ok(body)) => self.newsletter.reply(req, &subject, &body),
            (Err(err), _) | (_, Err(err)) => {
                error!("{scope}: could not render {body:?}: {err}");
                return;
            }
        };
        if let Err(err) = self.mailer.send(&mail) {
            error!("{scope}: could not send {body:?} notice: {err}");
        }
    }
}
