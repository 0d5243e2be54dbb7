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

use std::{path::PathBuf, time::Duration};

use newsletter::{
    melib::smtp, Configuration, Context, Controller, Error, Language, Mailer, Newsletter,
    Request, Result, Route, SendMail,
};

/// Print a sample configuration to STDOUT.
pub fn sample_config(with_smtp: bool) -> Result<()> {
    let mut new = Configuration::new("/path/to/newsletter");
    new.local_user = Some("user".to_string());
    new.hostname = Some("example.com".to_string());
    if with_smtp {
        new.send_mail = SendMail::Smtp(smtp::SmtpServerConf {
            hostname: "mail.example.com".to_string(),
            port: 587,
            envelope_from: "".to_string(),
            auth: smtp::SmtpAuth::Auto {
                username: "user".to_string(),
                password: smtp::Password::Raw("hunter2".to_string()),
                auth_type: smtp::SmtpAuthType::default(),
                require_auth: true,
            },
            security: smtp::SmtpSecurity::StartTLS {
                danger_accept_invalid_certs: false,
            },
            extensions: Default::default(),
        });
    }
    println!("{}", new.to_toml()?);
    Ok(())
}

/// Run `route` on the raw message `input`.
///
/// Failures of the route are logged (and reported to the sender by the
/// controller) but not returned: the message was delivered and must not
/// bounce. A message that cannot be parsed is saved to the list directory.
pub fn handle(
    config: &Configuration,
    newsletter: Newsletter,
    route: Route,
    input: &[u8],
) -> Result<()> {
    let request = match Request::parse(input) {
        Ok(request) => request,
        Err(err) => {
            let path = config
                .save_message(String::from_utf8_lossy(input).into_owned())
                .context("Could not save unparsable message.")?;
            log::error!(
                "route {:?}: could not parse e-mail ({err}), saved it to {}.",
                route.as_str(),
                path.display()
            );
            return Ok(());
        }
    };
    let mut controller = Controller::new(newsletter, config.send_mail.clone());
    if let Ok(outcome) = controller.handle_request(route, &request) {
        log::trace!("route {:?} returned {outcome:?}", route.as_str());
    }
    Ok(())
}

/// Print the subscriber list.
pub fn subscribers(newsletter: &Newsletter, quiet: bool) -> Result<()> {
    let subscribers = newsletter.subscribers();
    if subscribers.is_empty() {
        if !quiet {
            println!("No subscribers found.");
        }
        return Ok(());
    }
    for address in subscribers {
        println!("{address}");
    }
    Ok(())
}

/// Update the settings given as arguments and print the result.
pub fn settings(
    newsletter: &mut Newsletter,
    title: Option<String>,
    display_name: Option<String>,
    language: Option<Language>,
    signature_file: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    if title.is_some() || display_name.is_some() || language.is_some() {
        let mut settings = newsletter.settings().clone();
        if let Some(title) = title {
            settings.title = title;
        }
        if let Some(display_name) = display_name {
            settings.display_name = display_name;
        }
        if let Some(language) = language {
            settings.language = language;
        }
        newsletter.save_settings(settings)?;
    }
    if let Some(path) = signature_file {
        let signature = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read signature file {}.", path.display()))?;
        newsletter.save_signature(signature)?;
    }
    if quiet {
        return Ok(());
    }
    let settings = newsletter.settings();
    println!("Owner: {}", newsletter.identity().owner_address());
    println!("Directory: {}", newsletter.dir().display());
    println!("Title: {}", settings.title);
    println!("Display name: {}", settings.display_name);
    println!("Language: {}", settings.language);
    if newsletter.signature().is_empty() {
        println!("Signature: None");
    } else {
        println!("Signature:\n{}", newsletter.signature());
    }
    Ok(())
}

/// Submit a newsletter. Without `yes`, a preview is mailed to the owner
/// and the broadcast waits for its confirmation.
pub fn send(
    newsletter: &Newsletter,
    mailer: &dyn Mailer,
    subject: &str,
    body: &str,
    yes: bool,
    quiet: bool,
) -> Result<()> {
    let catalog = newsletter.messages();
    if yes {
        let mail = newsletter.broadcast_mail(&catalog, subject, body)?;
        newsletter.broadcast(mailer, &mail)?;
        if !quiet {
            println!(
                "Newsletter sent to {} subscribers.",
                newsletter.subscribers().len()
            );
        }
        return Ok(());
    }
    let token = newsletter.create_ticket(subject, body)?;
    let mail = newsletter.preview_mail(&catalog, &token, subject, body)?;
    mailer
        .send(&mail)
        .map_err(|err| Error::mail_send(&mail.to, err))?;
    if !quiet {
        println!(
            "Preview sent to {}, reply to it to send the newsletter.",
            mail.to
        );
    }
    Ok(())
}

/// Delete pending broadcasts older than `older_than`.
pub fn purge_tickets(newsletter: &Newsletter, older_than: Duration, quiet: bool) -> Result<()> {
    let removed = newsletter.tickets().purge_older_than(older_than)?;
    if !quiet {
        println!(
            "Removed {removed} stale ticket files from {}.",
            newsletter.tickets().dir().display()
        );
    }
    Ok(())
}
