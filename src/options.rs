// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::k_limits;

use clap::{App, AppSettings, Arg, Error, ErrorKind};
use itertools::Itertools;
use mirai_annotations::*;

/// Creates the clap::App metadata for argument parsing.
fn make_options_parser<'a>() -> App<'a, 'a> {
    // We could put this into lazy_static! with a Mutex around, but we really do not expect
    // to construct this more than once per regular program run.
    App::new("craig")
        .setting(AppSettings::NoBinaryName)
        .version("v0.9.1")
        .arg(
            Arg::with_name("no_interpolation")
                .long("no_interpolation")
                .takes_value(false)
                .help("Disable interpolation and subsumption entirely.")
                .long_help(
                    "All core operations become no-ops; the executor explores every path.",
                ),
        )
        .arg(
            Arg::with_name("no_existential")
                .long("no_existential")
                .takes_value(false)
                .help("Store interpolants verbatim, without shadow renaming.")
                .long_help(
                    "Interpolants keep the state-local array symbols, which makes them weaker \
                     but keeps every solver query quantifier-free.",
                ),
        )
        .arg(
            Arg::with_name("output_interpolation_tree")
                .long("output_interpolation_tree")
                .takes_value(false)
                .help("Record the search tree and allow a graph dump on shutdown."),
        )
        .arg(
            Arg::with_name("subsumption_timeout")
                .long("subsumption_timeout")
                .takes_value(true)
                .default_value("10")
                .help("The maximum number of seconds for one subsumption solver query.")
                .long_help("Zero disables the timeout."),
        )
}

/// Represents the recognized configuration options of the interpolation core.
#[derive(Clone, Debug)]
pub struct Options {
    /// Master switch; when false all core operations become no-ops.
    pub interpolation: bool,
    /// Skip shadow renaming and emit interpolants verbatim.
    pub no_existential: bool,
    /// Enable the optional search-tree export.
    pub output_interpolation_tree: bool,
    /// Per-query solver timeout in seconds.
    pub subsumption_timeout: f64,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            interpolation: true,
            no_existential: false,
            output_interpolation_tree: false,
            subsumption_timeout: k_limits::DEFAULT_SUBSUMPTION_TIMEOUT,
        }
    }
}

impl Options {
    /// Parse options from an argument string. The argument string will be
    /// split using unix shell escaping rules. Any content beyond the leftmost
    /// `--` token will be returned (excluding this token).
    pub fn parse_from_str(&mut self, s: &str) -> Vec<String> {
        self.parse(&shellwords::split(s).unwrap_or_else(|e| {
            assume_unreachable!("Cannot parse argument string: {:?}", e)
        }))
    }

    /// Parses options from a list of strings. Any content beyond the leftmost
    /// `--` token will be returned (excluding this token).
    pub fn parse(&mut self, args: &[String]) -> Vec<String> {
        let mut our_args_end = args.len();
        let mut executor_args_start = 0;
        if let Some((p, _)) = args.iter().find_position(|s| s.as_str() == "--") {
            our_args_end = p;
            executor_args_start = p + 1;
        }
        let our_args = &args[0..our_args_end];
        let matches = if executor_args_start == 0 {
            // The arguments may not be intended for us and may get here via
            // some tool, so do not report errors here, but just assume that
            // the arguments were not meant for us.
            match make_options_parser().get_matches_from_safe(our_args.iter()) {
                Ok(matches) => {
                    // Looks like these are our options after all.
                    executor_args_start = args.len();
                    matches
                }
                Err(Error {
                    kind: ErrorKind::HelpDisplayed,
                    message,
                    ..
                }) => {
                    println!("{}\n", message);
                    return args.to_vec();
                }
                Err(Error {
                    kind: ErrorKind::UnknownArgument,
                    ..
                }) => {
                    // Just send all of the arguments to the executor.
                    return args.to_vec();
                }
                Err(e) => {
                    e.exit();
                }
            }
        } else {
            // This will display error diagnostics for arguments that are not
            // valid for the core.
            make_options_parser().get_matches_from(our_args.iter())
        };

        if matches.is_present("no_interpolation") {
            self.interpolation = false;
        }
        if matches.is_present("no_existential") {
            self.no_existential = true;
        }
        if matches.is_present("output_interpolation_tree") {
            self.output_interpolation_tree = true;
        }
        if matches.is_present("subsumption_timeout") {
            self.subsumption_timeout = match matches.value_of("subsumption_timeout") {
                Some(s) => match s.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => assume_unreachable!("--subsumption_timeout expects a number"),
                },
                None => assume_unreachable!(),
            }
        }
        args[executor_args_start..].to_vec()
    }
}
