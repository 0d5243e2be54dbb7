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

//! Submit e-mail.

use std::{io::Write, process::Stdio};

use melib::{smol, smtp::SmtpConnection};

use crate::{errors::*, mail::Mail, SendMail};

/// Delivers outbound mail.
pub trait Mailer {
    /// Submit `mail` to its recipient.
    fn send(&self, mail: &Mail) -> Result<()>;
}

impl<M: Mailer + ?Sized> Mailer for &M {
    fn send(&self, mail: &Mail) -> Result<()> {
        (**self).send(mail)
    }
}

impl<M: Mailer + ?Sized> Mailer for Box<M> {
    fn send(&self, mail: &Mail) -> Result<()> {
        (**self).send(mail)
    }
}

impl Mailer for SendMail {
    fn send(&self, mail: &Mail) -> Result<()> {
        let message = mail.to_rfc5322()?;
        log::info!(
            "Sending message from {} to {} with subject {:?}",
            mail.from_address,
            mail.to,
            mail.subject
        );
        match self {
            Self::ShellCommand(cmd) => submit_shell(cmd, &mail.to, &message),
            Self::Smtp(conf) => {
                let recipients = melib::Address::list_try_from(mail.to.as_str())
                    .context(format!("Could not parse {:?}", mail.to))?;
                let conf = conf.clone();
                smol::future::block_on(async move {
                    let mut conn = SmtpConnection::new_connection(conf).await?;
                    conn.mail_transaction(&message, Some(&recipients)).await?;
                    Ok::<(), Error>(())
                })
            }
        }
    }
}

fn submit_shell(cmd: &str, to: &str, message: &str) -> Result<()> {
    let mut child = std::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .env("TO_ADDRESS", to)
        .stdout(Stdio::piped())
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("sh command failed to start")?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::from("Failed to open stdin"))?;

    let builder = std::thread::Builder::new();

    std::thread::scope(|s| {
        let handler = builder
            .spawn_scoped(s, move || stdin.write_all(message.as_bytes()))
            .context("Could not spawn IPC communication thread for ShellCommand process")?;

        handler
            .join()
            .map_err(|_| {
                Error::new_external(
                    "Could not join with IPC communication thread for ShellCommand process",
                )
            })?
            .context("Could not write message to ShellCommand process")?;
        let result = child.wait_with_output()?;
        if !result.status.success() {
            return Err(Error::new_external(format!(
                "{} process failed with exit code: {:?}\n{}",
                cmd,
                result.status.code(),
                String::from_utf8_lossy(&result.stderr)
            )));
        }
        Ok::<(), Error>(())
    })
}
