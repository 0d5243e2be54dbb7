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

extern crate stderrlog;

use std::path::PathBuf;

pub use clap::{builder::TypedValueParser, Args, CommandFactory, Parser, Subcommand};
use newsletter::{Language, Route};

#[derive(Debug, Parser)]
#[command(
    name = "newsletter",
    about = "mail-driven newsletter manager",
    long_about = "Tool for running a newsletter by e-mail: subscriptions and broadcasts are \
                  requested and confirmed by mail.",
    before_long_help = "GNU Affero version 3 or later <https://www.gnu.org/licenses/>",
    author,
    version
)]
pub struct Opt {
    /// Print the parsed command line options.
    #[arg(short, long)]
    pub debug: bool,

    /// Configuration file to use. Defaults to
    /// `$XDG_CONFIG_HOME/newsletter/config.toml`.
    #[arg(short, long, value_parser)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Command,
    /// Silence all output.
    #[arg(short, long)]
    pub quiet: bool,
    /// Verbose mode (-v, -vv, -vvv, etc).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Debug log timestamp (sec, ms, ns, none).
    #[arg(short, long)]
    pub ts: Option<stderrlog::Timestamp>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints a sample config file to STDOUT.
    ///
    /// You can generate a new configuration file by writing the output to a file, e.g:
    /// newsletter sample-config > config.toml
    SampleConfig {
        /// Use an SMTP connection instead of a shell process.
        #[arg(long)]
        with_smtp: bool,
    },
    /// Run a route on the message read from STDIN.
    ///
    /// This is the command the MTA pipes `owner+ROUTE@host` mail to, for
    /// example from `~/.forward+subscribe`:
    ///
    ///   "|newsletter handle subscribe"
    ///
    /// Route failures are logged and reported to the sender by mail; they
    /// never cause a bounce.
    Handle {
        /// Route to run.
        #[arg(value_parser = RouteValueParser)]
        route: Route,
    },
    /// Lists all subscribers.
    Subscribers,
    /// Print or update the newsletter settings.
    Settings {
        /// Newsletter title, used in the sender name.
        #[arg(long)]
        title: Option<String>,
        /// Sender display name.
        #[arg(long)]
        display_name: Option<String>,
        /// Language of the automatic messages.
        #[arg(long, value_parser = LanguageValueParser)]
        language: Option<Language>,
        /// Replace the signature with the content of this file.
        #[arg(long, value_parser)]
        signature_file: Option<PathBuf>,
    },
    /// Submit a newsletter from the command line.
    ///
    /// Without `--yes` this behaves like the `send` route: a preview is
    /// mailed to the owner, who confirms the broadcast by replying to it.
    Send {
        /// Subject of the newsletter.
        subject: String,
        /// File containing the body. Read from STDIN if absent.
        #[arg(value_parser)]
        body_file: Option<PathBuf>,
        /// Broadcast right away without a preview.
        #[arg(long)]
        yes: bool,
    },
    /// Delete pending broadcasts that were never confirmed.
    PurgeTickets {
        /// Minimum age of the deleted pending broadcasts.
        #[arg(long)]
        older_than_secs: u64,
    },
}

/// Parses a [`Route`] from its sub-address name.
#[derive(Copy, Clone, Debug, Default)]
pub struct RouteValueParser;

impl TypedValueParser for RouteValueParser {
    type Value = Route;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> std::result::Result<Self::Value, clap::Error> {
        TypedValueParser::parse(self, cmd, arg, value.to_owned())
    }

    fn parse(
        &self,
        cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: std::ffi::OsString,
    ) -> std::result::Result<Self::Value, clap::Error> {
        use std::str::FromStr;

        use clap::error::ErrorKind;

        if value.is_empty() {
            return Err(cmd.clone().error(
                ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand,
                "Route value required",
            ));
        }
        Self::Value::from_str(value.to_str().ok_or_else(|| {
            cmd.clone()
                .error(ErrorKind::InvalidValue, "Route value is not an UTF-8 string")
        })?)
        .map_err(|err| cmd.clone().error(ErrorKind::InvalidValue, err))
    }

    fn possible_values(
        &self,
    ) -> Option<Box<dyn Iterator<Item = clap::builder::PossibleValue> + '_>> {
        Some(Box::new(
            Route::possible_values()
                .iter()
                .map(clap::builder::PossibleValue::new),
        ))
    }
}

/// Parses a [`Language`] from its code or English name.
#[derive(Copy, Clone, Debug, Default)]
pub struct LanguageValueParser;

impl TypedValueParser for LanguageValueParser {
    type Value = Language;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> std::result::Result<Self::Value, clap::Error> {
        TypedValueParser::parse(self, cmd, arg, value.to_owned())
    }

    fn parse(
        &self,
        cmd: &clap::Command,
        _arg: Option<&clap::Arg>,
        value: std::ffi::OsString,
    ) -> std::result::Result<Self::Value, clap::Error> {
        use std::str::FromStr;

        use clap::error::ErrorKind;

        Self::Value::from_str(value.to_str().ok_or_else(|| {
            cmd.clone()
                .error(ErrorKind::InvalidValue, "Language value is not an UTF-8 string")
        })?)
        .map_err(|err| cmd.clone().error(ErrorKind::InvalidValue, err))
    }

    fn possible_values(
        &self,
    ) -> Option<Box<dyn Iterator<Item = clap::builder::PossibleValue> + '_>> {
        Some(Box::new(
            Language::possible_values()
                .iter()
                .map(clap::builder::PossibleValue::new),
        ))
    }
}
