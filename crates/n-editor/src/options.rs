//! Editor options — Vim-style `set` directives.
//!
//! Options are flags, not a configuration file: the host passes directive
//! strings (`"ic scs"`, `"nows"`, `"regdepth=5"`) which [`parse_set`] turns
//! into [`SetDirective`]s and [`Options::apply`] applies.
//!
//! # Supported syntax
//!
//! | Syntax          | Effect                        |
//! |-----------------|-------------------------------|
//! | `option`        | Enable boolean / show numeric |
//! | `nooption`      | Disable boolean               |
//! | `option!`       | Toggle boolean                |
//! | `option?`       | Query current value           |
//! | `option=N`      | Assign numeric value          |
//! | (empty)         | Show changed options          |
//! | `all`           | Show all options              |
//!
//! # Option names
//!
//! | Full name     | Abbrev | Type    | Default |
//! |---------------|--------|---------|---------|
//! | `ignorecase`  | `ic`   | bool    | false   |
//! | `smartcase`   | `scs`  | bool    | false   |
//! | `wrapscan`    | `ws`   | bool    | true    |
//! | `magic`       |        | bool    | true    |
//! | `expandtab`   | `et`   | bool    | true    |
//! | `shiftwidth`  | `sw`   | integer | 4       |
//! | `regdepth`    | `rd`   | integer | 9       |
//! | `markhistory` | `mh`   | integer | 10      |

use thiserror::Error;

use crate::register::MAX_DEPTH;
use crate::search::{CaseMode, SearchConfig};

/// Errors from applying a directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    Unknown(String),
    #[error("not a boolean option: {0}")]
    NotBoolean(String),
    #[error("number required after =: {0}")]
    NotNumeric(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// A parsed `set` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDirective {
    /// `option` — enable a boolean option.
    On(String),
    /// `nooption` — disable a boolean option.
    Off(String),
    /// `option!` — toggle a boolean option.
    Toggle(String),
    /// `option?` — query the current value.
    Query(String),
    /// `option=value` — assign a value.
    Assign(String, String),
    /// No arguments — show changed options.
    ShowChanged,
    /// `all` — show all options.
    ShowAll,
}

const BOOL_OPTIONS: &[(&str, &str)] = &[
    ("ignorecase", "ic"),
    ("smartcase", "scs"),
    ("wrapscan", "ws"),
    ("magic", "magic"),
    ("expandtab", "et"),
];

const NUMERIC_OPTIONS: &[(&str, &str)] = &[
    ("shiftwidth", "sw"),
    ("regdepth", "rd"),
    ("markhistory", "mh"),
];

fn canonical(table: &[(&'static str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(full, abbrev)| name == *full || name == *abbrev)
        .map(|(full, _)| *full)
}

/// Returns `true` if `name` is a known boolean option (full name or abbreviation).
#[must_use]
pub fn is_bool_option(name: &str) -> bool {
    canonical(BOOL_OPTIONS, name).is_some()
}

/// Returns `true` if `name` is a known numeric option (full name or abbreviation).
#[must_use]
pub fn is_numeric_option(name: &str) -> bool {
    canonical(NUMERIC_OPTIONS, name).is_some()
}

/// Parse a directive string into directives. Multiple space-separated
/// arguments are supported; an empty string is [`SetDirective::ShowChanged`].
#[must_use]
pub fn parse_set(args: &str) -> Vec<SetDirective> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return vec![SetDirective::ShowChanged];
    }
    trimmed.split_whitespace().map(parse_set_arg).collect()
}

/// Parse a single argument into a directive.
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
    // `nomagic` is Off("magic"); `noxyz` for unknown xyz stays On("noxyz").
    if let Some(name) = arg.strip_prefix("no") {
        if is_bool_option(name) {
            return SetDirective::Off(name.to_string());
        }
    }
    if is_numeric_option(arg) {
        return SetDirective::Query(arg.to_string());
    }
    SetDirective::On(arg.to_string())
}

/// Format a boolean option for display: `"name"` or `"noname"`.
#[must_use]
pub fn format_bool(name: &str, value: bool) -> String {
    if value {
        name.to_string()
    } else {
        format!("no{name}")
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// The session's option values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub ignorecase: bool,
    pub smartcase: bool,
    pub wrapscan: bool,
    pub magic: bool,
    pub expandtab: bool,
    pub shiftwidth: usize,
    /// Numbered-register shift depth, 1..=9.
    pub regdepth: usize,
    /// How many recent global marks are persisted.
    pub markhistory: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignorecase: false,
            smartcase: false,
            wrapscan: true,
            magic: true,
            expandtab: true,
            shiftwidth: 4,
            regdepth: MAX_DEPTH,
            markhistory: 10,
        }
    }
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The case mode `ignorecase` and `smartcase` select.
    #[must_use]
    pub const fn case_mode(&self) -> CaseMode {
        match (self.ignorecase, self.smartcase) {
            (false, _) => CaseMode::Sensitive,
            (true, false) => CaseMode::Insensitive,
            (true, true) => CaseMode::Smart,
        }
    }

    #[must_use]
    pub const fn search_config(&self) -> SearchConfig {
        SearchConfig {
            case: self.case_mode(),
            wrap: self.wrapscan,
            magic: self.magic,
        }
    }

    /// One level of indentation.
    #[must_use]
    pub fn indent_unit(&self) -> String {
        if self.expandtab {
            " ".repeat(self.shiftwidth)
        } else {
            "\t".to_string()
        }
    }

    /// Parse and apply `args`, returning the display lines of any queries.
    ///
    /// # Errors
    ///
    /// Stops at the first bad directive; earlier directives stay applied.
    pub fn set(&mut self, args: &str) -> Result<Vec<String>, OptionError> {
        let mut out = Vec::new();
        for directive in parse_set(args) {
            out.extend(self.apply(&directive)?);
        }
        Ok(out)
    }

    /// Apply one directive.
    pub fn apply(&mut self, directive: &SetDirective) -> Result<Vec<String>, OptionError> {
        match directive {
            SetDirective::On(name) => self.set_bool(name, |_| true).map(|()| Vec::new()),
            SetDirective::Off(name) => self.set_bool(name, |_| false).map(|()| Vec::new()),
            SetDirective::Toggle(name) => self.set_bool(name, |v| !v).map(|()| Vec::new()),
            SetDirective::Query(name) => self.show(name).map(|line| vec![line]),
            SetDirective::Assign(name, value) => {
                self.assign(name, value)?;
                Ok(Vec::new())
            }
            SetDirective::ShowChanged => {
                let defaults = Self::default();
                Ok(Self::all_names()
                    .filter(|name| self.show(name).ok() != defaults.show(name).ok())
                    .filter_map(|name| self.show(name).ok())
                    .collect())
            }
            SetDirective::ShowAll => Ok(Self::all_names().filter_map(|n| self.show(n).ok()).collect()),
        }
    }

    fn all_names() -> impl Iterator<Item = &'static str> {
        BOOL_OPTIONS.iter().chain(NUMERIC_OPTIONS).map(|(full, _)| *full)
    }

    fn bool_slot(&mut self, name: &str) -> Result<&mut bool, OptionError> {
        match canonical(BOOL_OPTIONS, name) {
            Some("ignorecase") => Ok(&mut self.ignorecase),
            Some("smartcase") => Ok(&mut self.smartcase),
            Some("wrapscan") => Ok(&mut self.wrapscan),
            Some("magic") => Ok(&mut self.magic),
            Some("expandtab") => Ok(&mut self.expandtab),
            _ if is_numeric_option(name) => Err(OptionError::NotBoolean(name.to_string())),
            _ => Err(OptionError::Unknown(name.to_string())),
        }
    }

    fn set_bool(&mut self, name: &str, f: impl FnOnce(bool) -> bool) -> Result<(), OptionError> {
        let slot = self.bool_slot(name)?;
        *slot = f(*slot);
        tracing::debug!(target: "editor.options", name, value = *slot, "set");
        Ok(())
    }

    fn assign(&mut self, name: &str, value: &str) -> Result<(), OptionError> {
        let Some(full) = canonical(NUMERIC_OPTIONS, name) else {
            return Err(if is_bool_option(name) {
                OptionError::NotNumeric(name.to_string())
            } else {
                OptionError::Unknown(name.to_string())
            });
        };
        let invalid = || OptionError::InvalidValue { name: full, value: value.to_string() };
        let n: usize = value.parse().map_err(|_| invalid())?;
        match full {
            "shiftwidth" if n >= 1 => self.shiftwidth = n,
            "regdepth" if (1..=MAX_DEPTH).contains(&n) => self.regdepth = n,
            "markhistory" if n <= 26 => self.markhistory = n,
            _ => return Err(invalid()),
        }
        tracing::debug!(target: "editor.options", name = full, value = n, "set");
        Ok(())
    }

    fn show(&self, name: &str) -> Result<String, OptionError> {
        if let Some(full) = canonical(BOOL_OPTIONS, name) {
            let value = match full {
                "ignorecase" => self.ignorecase,
                "smartcase" => self.smartcase,
                "wrapscan" => self.wrapscan,
                "magic" => self.magic,
                _ => self.expandtab,
            };
            return Ok(format_bool(full, value));
        }
        let value = match canonical(NUMERIC_OPTIONS, name) {
            Some("shiftwidth") => self.shiftwidth,
            Some("regdepth") => self.regdepth,
            Some("markhistory") => self.markhistory,
            _ => return Err(OptionError::Unknown(name.to_string())),
        };
        Ok(format!("{}={value}", canonical(NUMERIC_OPTIONS, name).unwrap_or(name)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_set_arg ─────────────────────────────────────────────────────

    #[test]
    fn parse_boolean_forms() {
        assert_eq!(parse_set_arg("ic"), SetDirective::On("ic".into()));
        assert_eq!(parse_set_arg("noic"), SetDirective::Off("ic".into()));
        assert_eq!(parse_set_arg("nomagic"), SetDirective::Off("magic".into()));
        assert_eq!(parse_set_arg("ws!"), SetDirective::Toggle("ws".into()));
        assert_eq!(parse_set_arg("scs?"), SetDirective::Query("scs".into()));
    }

    #[test]
    fn parse_numeric_forms() {
        assert_eq!(
            parse_set_arg("regdepth=5"),
            SetDirective::Assign("regdepth".into(), "5".into())
        );
        assert_eq!(parse_set_arg("sw"), SetDirective::Query("sw".into()));
    }

    #[test]
    fn parse_unknown_no_prefix_stays_on() {
        assert_eq!(parse_set_arg("nofoobar"), SetDirective::On("nofoobar".into()));
    }

    #[test]
    fn parse_empty_and_all() {
        assert_eq!(parse_set("  "), vec![SetDirective::ShowChanged]);
        assert_eq!(parse_set("all"), vec![SetDirective::ShowAll]);
        assert_eq!(parse_set("ic ws!").len(), 2);
    }

    // ── Options::set ─────────────────────────────────────────────────────

    #[test]
    fn case_mode_follows_flags() {
        let mut o = Options::new();
        assert_eq!(o.case_mode(), CaseMode::Sensitive);
        o.set("scs").expect("valid");
        assert_eq!(o.case_mode(), CaseMode::Sensitive);
        o.set("ic").expect("valid");
        assert_eq!(o.case_mode(), CaseMode::Smart);
        o.set("noscs").expect("valid");
        assert_eq!(o.case_mode(), CaseMode::Insensitive);
    }

    #[test]
    fn toggles_and_assignments() {
        let mut o = Options::new();
        o.set("ws! nomagic rd=3 sw=2").expect("valid");
        assert!(!o.wrapscan);
        assert!(!o.magic);
        assert_eq!(o.regdepth, 3);
        assert_eq!(o.indent_unit(), "  ");
        let config = o.search_config();
        assert!(!config.wrap && !config.magic);
    }

    #[test]
    fn queries_report_values() {
        let mut o = Options::new();
        assert_eq!(o.set("ic? sw").expect("valid"), vec!["noignorecase", "shiftwidth=4"]);
        o.set("mh=3").expect("valid");
        assert_eq!(o.set("").expect("valid"), vec!["markhistory=3"]);
        assert_eq!(o.set("all").expect("valid").len(), 8);
    }

    #[test]
    fn errors() {
        let mut o = Options::new();
        assert_eq!(o.set("bogus"), Err(OptionError::Unknown("bogus".into())));
        assert_eq!(o.set("sw!"), Err(OptionError::NotBoolean("sw".into())));
        assert_eq!(o.set("ic=1"), Err(OptionError::NotNumeric("ic".into())));
        assert_eq!(
            o.set("regdepth=12"),
            Err(OptionError::InvalidValue { name: "regdepth", value: "12".into() })
        );
        assert_eq!(
            o.set("sw=x"),
            Err(OptionError::InvalidValue { name: "shiftwidth", value: "x".into() })
        );
    }

    #[test]
    fn format_bool_on_off() {
        assert_eq!(format_bool("magic", true), "magic");
        assert_eq!(format_bool("magic", false), "nomagic");
    }
}
