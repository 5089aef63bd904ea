//! Editor options: the `:set` system.
//!
//! [`Options`] holds the values and is what the session serializes; the
//! parsing layer ([`parse_set`], [`SetDirective`]) turns `:set` arguments
//! into directives that [`Options::apply`] carries out.
//!
//! # Supported syntax
//!
//! | Syntax           | Effect                        |
//! |------------------|-------------------------------|
//! | `:set option`    | Enable boolean / show numeric |
//! | `:set nooption`  | Disable boolean               |
//! | `:set invoption` | Toggle boolean                |
//! | `:set option!`   | Toggle boolean                |
//! | `:set option?`   | Query current value           |
//! | `:set option=N`  | Assign numeric value          |
//! | `:set`           | Show changed options          |
//! | `:set all`       | Show all options              |
//!
//! # Option names
//!
//! | Full name     | Abbrev | Type    | Default |
//! |---------------|--------|---------|---------|
//! | `ignorecase`  | `ic`   | bool    | true    |
//! | `smartcase`   | `scs`  | bool    | true    |
//! | `wrapscan`    | `ws`   | bool    | true    |
//! | `incsearch`   | `is`   | bool    | true    |
//! | `hlsearch`    | `hls`  | bool    | true    |
//! | `expandtab`   | `et`   | bool    | true    |
//! | `shiftwidth`  | `sw`   | integer | 4       |
//! | `tabstop`     | `ts`   | integer | 4       |
//! | `timeoutlen`  | `tm`   | integer | 1000    |
//! | `history`     | `hi`   | integer | 50      |
//! | `maxmapdepth` | `mmd`  | integer | 1000    |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ViError};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Option values. Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    pub ignorecase: bool,
    pub smartcase: bool,
    pub wrapscan: bool,
    pub incsearch: bool,
    pub hlsearch: bool,
    pub expandtab: bool,
    pub shiftwidth: usize,
    pub tabstop: usize,
    /// Milliseconds a partial mapping waits for its next key.
    pub timeoutlen: u64,
    /// Entries kept per history list.
    pub history: usize,
    pub maxmapdepth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignorecase: true,
            smartcase: true,
            wrapscan: true,
            incsearch: true,
            hlsearch: true,
            expandtab: true,
            shiftwidth: 4,
            tabstop: 4,
            timeoutlen: 1000,
            history: 50,
            maxmapdepth: 1000,
        }
    }
}

/// Current value of one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Number(u64),
}

struct OptionSpec {
    name: &'static str,
    abbrev: &'static str,
    boolean: bool,
}

const OPTIONS: &[OptionSpec] = &[
    OptionSpec { name: "expandtab", abbrev: "et", boolean: true },
    OptionSpec { name: "history", abbrev: "hi", boolean: false },
    OptionSpec { name: "hlsearch", abbrev: "hls", boolean: true },
    OptionSpec { name: "ignorecase", abbrev: "ic", boolean: true },
    OptionSpec { name: "incsearch", abbrev: "is", boolean: true },
    OptionSpec { name: "maxmapdepth", abbrev: "mmd", boolean: false },
    OptionSpec { name: "shiftwidth", abbrev: "sw", boolean: false },
    OptionSpec { name: "smartcase", abbrev: "scs", boolean: true },
    OptionSpec { name: "tabstop", abbrev: "ts", boolean: false },
    OptionSpec { name: "timeoutlen", abbrev: "tm", boolean: false },
    OptionSpec { name: "wrapscan", abbrev: "ws", boolean: true },
];

fn lookup(name: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|spec| spec.name == name || spec.abbrev == name)
}

/// Returns `true` if `name` is a known boolean option (full name or abbreviation).
#[must_use]
pub fn is_bool_option(name: &str) -> bool {
    lookup(name).is_some_and(|spec| spec.boolean)
}

/// Returns `true` if `name` is a known numeric option (full name or abbreviation).
#[must_use]
pub fn is_numeric_option(name: &str) -> bool {
    lookup(name).is_some_and(|spec| !spec.boolean)
}

/// Returns `true` if `name` is any known option.
#[must_use]
pub fn is_known_option(name: &str) -> bool {
    lookup(name).is_some()
}

impl Options {
    /// Value of an option by full name or abbreviation.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        let spec = lookup(name)?;
        Some(match spec.name {
            "expandtab" => OptionValue::Bool(self.expandtab),
            "hlsearch" => OptionValue::Bool(self.hlsearch),
            "ignorecase" => OptionValue::Bool(self.ignorecase),
            "incsearch" => OptionValue::Bool(self.incsearch),
            "smartcase" => OptionValue::Bool(self.smartcase),
            "wrapscan" => OptionValue::Bool(self.wrapscan),
            "history" => OptionValue::Number(self.history as u64),
            "maxmapdepth" => OptionValue::Number(self.maxmapdepth as u64),
            "shiftwidth" => OptionValue::Number(self.shiftwidth as u64),
            "tabstop" => OptionValue::Number(self.tabstop as u64),
            "timeoutlen" => OptionValue::Number(self.timeoutlen),
            _ => return None,
        })
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        match name {
            "expandtab" => self.expandtab = value,
            "hlsearch" => self.hlsearch = value,
            "ignorecase" => self.ignorecase = value,
            "incsearch" => self.incsearch = value,
            "smartcase" => self.smartcase = value,
            "wrapscan" => self.wrapscan = value,
            _ => {}
        }
    }

    fn set_number(&mut self, name: &str, value: u64) -> Result<()> {
        let as_size = || {
            usize::try_from(value).map_err(|_| ViError::InvalidArgument(format!("{name}={value}")))
        };
        match name {
            "shiftwidth" | "tabstop" | "maxmapdepth" if value == 0 => {
                return Err(ViError::InvalidArgument(format!("{name}=0")));
            }
            "history" => self.history = as_size()?,
            "maxmapdepth" => self.maxmapdepth = as_size()?,
            "shiftwidth" => self.shiftwidth = as_size()?,
            "tabstop" => self.tabstop = as_size()?,
            "timeoutlen" => self.timeoutlen = value,
            _ => {}
        }
        Ok(())
    }

    /// `name` or `noname` for booleans, `name=N` for numbers.
    #[must_use]
    pub fn describe(&self, name: &str) -> Option<String> {
        let spec = lookup(name)?;
        Some(match self.get(spec.name)? {
            OptionValue::Bool(value) => format_bool(spec.name, value),
            OptionValue::Number(n) => format!("{}={n}", spec.name),
        })
    }

    /// Options that differ from their defaults, described.
    #[must_use]
    pub fn changed(&self) -> Vec<String> {
        let defaults = Self::default();
        OPTIONS
            .iter()
            .filter(|spec| self.get(spec.name) != defaults.get(spec.name))
            .filter_map(|spec| self.describe(spec.name))
            .collect()
    }

    /// Carry out one directive. Returns the text to show, if any.
    ///
    /// # Errors
    ///
    /// `UnknownOption` for names not in the table, `InvalidArgument` for
    /// type mismatches and unparsable or out-of-range numbers.
    pub fn apply(&mut self, directive: &SetDirective) -> Result<Option<String>> {
        let spec_for =
            |name: &str| lookup(name).ok_or_else(|| ViError::UnknownOption(name.to_string()));
        match directive {
            SetDirective::ShowChanged => Ok(Some(self.changed().join("  "))),
            SetDirective::ShowAll => Ok(Some(
                OPTIONS
                    .iter()
                    .filter_map(|spec| self.describe(spec.name))
                    .collect::<Vec<_>>()
                    .join("  "),
            )),
            SetDirective::Query(name) => {
                let spec = spec_for(name)?;
                Ok(self.describe(spec.name))
            }
            SetDirective::On(name) | SetDirective::Off(name) | SetDirective::Toggle(name) => {
                let spec = spec_for(name)?;
                if !spec.boolean {
                    return Err(ViError::InvalidArgument(name.clone()));
                }
                let value = match directive {
                    SetDirective::On(_) => true,
                    SetDirective::Off(_) => false,
                    _ => !matches!(self.get(spec.name), Some(OptionValue::Bool(true))),
                };
                self.set_bool(spec.name, value);
                debug!(option = spec.name, value, "option set");
                Ok(None)
            }
            SetDirective::Assign(name, raw) => {
                let spec = spec_for(name)?;
                if spec.boolean {
                    return Err(ViError::InvalidArgument(format!("{name}={raw}")));
                }
                let value: u64 = raw
                    .parse()
                    .map_err(|_| ViError::InvalidArgument(format!("{name}={raw}")))?;
                self.set_number(spec.name, value)?;
                debug!(option = spec.name, value, "option set");
                Ok(None)
            }
        }
    }

    /// Run a whole `:set` argument string.
    ///
    /// Directives apply left to right; the first failure stops the rest.
    ///
    /// # Errors
    ///
    /// See [`Options::apply`].
    pub fn run_set(&mut self, args: &str) -> Result<Option<String>> {
        let mut shown = Vec::new();
        for directive in parse_set(args) {
            if let Some(text) = self.apply(&directive)? {
                shown.push(text);
            }
        }
        Ok((!shown.is_empty()).then(|| shown.join("  ")))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A parsed `:set` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDirective {
    /// `:set option`: enable a boolean option.
    On(String),
    /// `:set nooption`: disable a boolean option.
    Off(String),
    /// `:set option!` or `:set invoption`: toggle a boolean option.
    Toggle(String),
    /// `:set option?`: query the current value.
    Query(String),
    /// `:set option=value`: assign a value.
    Assign(String, String),
    /// `:set` with no arguments: show changed options.
    ShowChanged,
    /// `:set all`: show all options.
    ShowAll,
}

/// Parse the full `:set` arguments string into directives.
///
/// An empty argument string produces [`SetDirective::ShowChanged`].
#[must_use]
pub fn parse_set(args: &str) -> Vec<SetDirective> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return vec![SetDirective::ShowChanged];
    }
    trimmed.split_whitespace().map(parse_set_arg).collect()
}

/// Parse a single `:set` argument into a directive.
#[must_use]
pub fn parse_set_arg(arg: &str) -> SetDirective {
    if arg == "all" {
        return SetDirective::ShowAll;
    }

    if let Some((name, value)) = arg.split_once('=') {
        return SetDirective::Assign(name.to_string(), value.to_string());
    }
    if let Some(name) = arg.strip_suffix('?') {
        return SetDirective::Query(name.to_string());
    }
    if let Some(name) = arg.strip_suffix('!') {
        return SetDirective::Toggle(name.to_string());
    }

    // `no`/`inv` only when the rest is a boolean option, so `:set nohls`
    // works without breaking names that happen to start with them.
    if let Some(name) = arg.strip_prefix("no").filter(|n| is_bool_option(n)) {
        return SetDirective::Off(name.to_string());
    }
    if let Some(name) = arg.strip_prefix("inv").filter(|n| is_bool_option(n)) {
        return SetDirective::Toggle(name.to_string());
    }

    // A bare numeric name shows its value.
    if is_numeric_option(arg) {
        return SetDirective::Query(arg.to_string());
    }

    SetDirective::On(arg.to_string())
}

/// `"name"` when true, `"noname"` when false.
#[must_use]
pub fn format_bool(name: &str, value: bool) -> String {
    if value {
        name.to_string()
    } else {
        format!("no{name}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
