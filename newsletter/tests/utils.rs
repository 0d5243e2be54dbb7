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

#![allow(dead_code)]

use std::{cell::RefCell, path::Path, sync::Once, time::Duration};

use newsletter::{
    mail::Mail, tickets::TicketStore, Controller, Identity, Mailer, Newsletter, Result,
};

static INIT_STDERR_LOGGING: Once = Once::new();

pub fn init_stderr_logging() {
    INIT_STDERR_LOGGING.call_once(|| {
        stderrlog::new()
            .quiet(false)
            .verbosity(15)
            .show_module_names(true)
            .timestamp(stderrlog::Timestamp::Millisecond)
            .init()
            .unwrap();
    });
}

/// Records sent mail instead of submitting it.
#[derive(Default)]
pub struct Recorder {
    pub sent: RefCell<Vec<Mail>>,
    pub failing: RefCell<Vec<String>>,
}

impl Recorder {
    pub fn fail_for(&self, address: &str) {
        self.failing.borrow_mut().push(address.to_string());
    }

    pub fn take(&self) -> Vec<Mail> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

impl Mailer for Recorder {
    fn send(&self, mail: &Mail) -> Result<()> {
        if self.failing.borrow().contains(&mail.to) {
            return Err(newsletter::Error::new_external(format!(
                "{} refused the message",
                mail.to
            )));
        }
        self.sent.borrow_mut().push(mail.clone());
        Ok(())
    }
}

/// Write a list owned by `user@club1.fr` with one subscriber, a title, a
/// display name and a signature.
pub fn write_fixture(dir: &Path) {
    std::fs::write(dir.join("emails"), "recipient@club1.fr\n").unwrap();
    std::fs::write(dir.join(".secret"), "BASIC_SECRET\n").unwrap();
    std::fs::write(dir.join("signature.txt"), "Bye bye").unwrap();
    std::fs::write(
        dir.join("settings.json"),
        r#"{"Title":"Title","DisplayName":"Display Name","Language":"en"}"#,
    )
    .unwrap();
}

/// Load the list in `dir` with a recording mailer.
pub fn reopen(dir: &Path) -> Controller<Recorder> {
    let list = Newsletter::open(dir, Identity::new("user", "club1.fr"))
        .unwrap()
        .with_tickets(TicketStore::new(dir.join("tickets")))
        .with_throttle(Duration::ZERO);
    Controller::new(list, Recorder::default())
}

/// [`write_fixture`] then [`reopen`].
pub fn setup(dir: &Path) -> Controller<Recorder> {
    write_fixture(dir);
    reopen(dir)
}
