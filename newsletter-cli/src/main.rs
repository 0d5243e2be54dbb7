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

use std::{io::Read, path::PathBuf, time::Duration};

use clap::Parser;
use newsletter::{Configuration, Context, Newsletter, Result};
use newsletter_cli::{args::*, commands::*};

/// `EX_TEMPFAIL` from `sysexits.h`: the MTA keeps the message and retries
/// delivery later.
const EX_TEMPFAIL: i32 = 75;

fn load(config: Option<PathBuf>) -> Result<(Configuration, Newsletter)> {
    let config_path = match config {
        Some(path) => path,
        None => Configuration::default_path()?,
    };
    let config = Configuration::from_file(&config_path).with_context(|| {
        format!(
            "Could not read configuration file from path: {}",
            config_path.display()
        )
    })?;
    let identity = config.identity()?;
    let newsletter = Newsletter::from_config(&config, identity)
        .context("Could not open the list directory of this configuration")?;
    Ok((config, newsletter))
}

fn run_app(
    config: Configuration,
    mut newsletter: Newsletter,
    cmd: Command,
    quiet: bool,
) -> Result<()> {
    use Command::*;
    match cmd {
        SampleConfig { .. } => {}
        Handle { route } => {
            let mut input = vec![];
            std::io::stdin()
                .read_to_end(&mut input)
                .context("Could not read message from STDIN.")?;
            handle(&config, newsletter, route, &input)?;
        }
        Subscribers => {
            subscribers(&newsletter, quiet).context("Could not list subscribers.")?;
        }
        Settings {
            title,
            display_name,
            language,
            signature_file,
        } => {
            settings(
                &mut newsletter,
                title,
                display_name,
                language,
                signature_file,
                quiet,
            )
            .context("Could not update settings.")?;
        }
        Send {
            subject,
            body_file,
            yes,
        } => {
            let body = match body_file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Could not read body file {}.", path.display()))?,
                None => {
                    let mut body = String::new();
                    std::io::stdin()
                        .read_to_string(&mut body)
                        .context("Could not read body from STDIN.")?;
                    body
                }
            };
            send(&newsletter, &config.send_mail, &subject, &body, yes, quiet)
                .context("Could not send newsletter.")?;
        }
        PurgeTickets { older_than_secs } => {
            purge_tickets(&newsletter, Duration::from_secs(older_than_secs), quiet)
                .context("Could not purge pending broadcasts.")?;
        }
    }

    Ok(())
}

fn main() {
    let opt = Opt::parse();
    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .module("newsletter")
        .quiet(opt.quiet)
        .verbosity(opt.verbose as usize)
        .timestamp(opt.ts.unwrap_or(stderrlog::Timestamp::Off))
        .init()
    {
        eprintln!("Could not initialize logging: {err}");
    }
    if opt.debug {
        println!("DEBUG: {:?}", &opt);
    }
    let Opt {
        config, cmd, quiet, ..
    } = opt;
    if let Command::SampleConfig { with_smtp } = cmd {
        if let Err(err) = sample_config(with_smtp) {
            eprintln!("{err}");
            std::process::exit(1);
        }
        return;
    }
    let (config, newsletter) = match load(config) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(EX_TEMPFAIL);
        }
    };
    if let Err(err) = run_app(config, newsletter, cmd, quiet) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
