//! Interactive locale selection and generation.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{BootstrapReport, Step, run_step};
use crate::commands::LocaleGen;
use crate::config_file::OobeConfig;
use crate::error::Result;
use crate::executor::{Executor, FileEdit};
use crate::terminal::{self, Terminal};

const UTF8: &str = "UTF-8";

/// One line of the supported-locale list, e.g. `en_US.UTF-8 UTF-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleEntry {
    pub name: String,
    pub charset: String,
}

impl LocaleEntry {
    /// Accepts both `name charset` and glibc's raw `name/charset \` form.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().trim_end_matches('\\').trim_end();
        if line.is_empty() || line.starts_with('#') || line.contains('=') {
            return None;
        }
        let mut fields = line.split(|c: char| c == '/' || c.is_whitespace()).filter(|f| !f.is_empty());
        let name = fields.next()?.to_string();
        let charset = fields.next()?.to_string();
        Some(Self { name, charset })
    }

    /// The line written to `locale.gen`.
    pub fn gen_line(&self) -> String {
        format!("{} {}", self.name, self.charset)
    }
}

pub fn parse_supported(contents: &str) -> Vec<LocaleEntry> {
    contents.lines().filter_map(LocaleEntry::parse).collect()
}

/// Map user input to a supported entry.
///
/// Input containing `.` or whitespace is a full entry and must match a name
/// (or a whole line) verbatim. Anything else is a territory code: the first
/// UTF-8 entry named `<code>.…` wins, else the first entry named exactly
/// `<code>` or continuing with a codeset (`.`) or modifier (`@`).
pub fn resolve_locale<'a>(input: &str, supported: &'a [LocaleEntry]) -> Option<&'a LocaleEntry> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.contains('.') || input.contains(char::is_whitespace) {
        return supported
            .iter()
            .find(|e| e.name == input || e.gen_line() == input);
    }

    let dotted = format!("{input}.");
    supported
        .iter()
        .find(|e| e.name.starts_with(&dotted) && e.charset == UTF8)
        .or_else(|| supported.iter().find(|e| names_code(&e.name, input)))
}

fn names_code(name: &str, code: &str) -> bool {
    name.strip_prefix(code)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['.', '@']))
}

/// Active lines of `locale.gen` (comments and blanks dropped, whitespace
/// collapsed).
fn configured_locales(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|contents| {
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect()
        })
        .unwrap_or_default()
}

fn has_lang(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|c| c.lines().any(|l| l.trim_start().starts_with("LANG=")))
        .unwrap_or(false)
}

/// Ask for locales until an empty answer. End of input also finishes.
fn prompt_locales(term: &mut dyn Terminal, supported: &[LocaleEntry]) -> Result<Vec<LocaleEntry>> {
    let mut accepted: Vec<LocaleEntry> = Vec::new();
    loop {
        let Some(answer) = term.read_line(
            "Locale (e.g. en_US or de_DE.UTF-8, 'list' to show all, empty to finish): ",
        )?
        else {
            break;
        };
        let answer = answer.trim();
        if answer.is_empty() {
            break;
        }
        if answer == "list" {
            for entry in supported {
                term.say(&entry.gen_line());
            }
            continue;
        }
        match resolve_locale(answer, supported) {
            Some(entry) if accepted.contains(entry) => {
                term.say(&format!("{} is already selected.", entry.name));
            }
            Some(entry) => {
                term.say(&format!("Selected {}", entry.gen_line()));
                accepted.push(entry.clone());
            }
            None => term.say(&format!(
                "'{answer}' is not a supported locale. Type 'list' to see all candidates."
            )),
        }
    }
    Ok(accepted)
}

pub(super) fn configure(
    exec: &dyn Executor,
    config: &OobeConfig,
    term: &mut dyn Terminal,
    report: &mut BootstrapReport,
) -> Result<()> {
    if !terminal::confirm(term, "Would you like to configure additional locales? [y/N] ")? {
        debug!("locale setup declined");
        return Ok(());
    }

    let paths = &config.paths;
    let supported = match fs::read_to_string(&paths.supported_locales) {
        Ok(contents) => parse_supported(&contents),
        Err(e) => {
            report.warn(
                Step::Locale,
                format!("cannot read {}: {e}", paths.supported_locales.display()),
                format!("edit {} and run locale-gen", paths.locale_gen.display()),
            );
            return Ok(());
        }
    };

    let accepted = prompt_locales(term, &supported)?;
    if accepted.is_empty() {
        return Ok(());
    }

    let existing = configured_locales(&paths.locale_gen);
    for entry in &accepted {
        let line = entry.gen_line();
        if existing.contains(&line) {
            debug!(locale = %line, "already in locale.gen");
            continue;
        }
        let edit = FileEdit::AppendLine {
            path: paths.locale_gen.clone(),
            line,
        };
        if let Err(e) = exec.edit(&edit) {
            report.warn(
                Step::Locale,
                e.to_string(),
                format!("add '{}' to {} by hand", entry.gen_line(), paths.locale_gen.display()),
            );
        }
    }

    if !run_step(exec, report, Step::Locale, &LocaleGen, "run locale-gen") {
        return Ok(());
    }

    if !has_lang(&paths.locale_conf) {
        let edit = FileEdit::AppendLine {
            path: paths.locale_conf.clone(),
            line: format!("LANG={}", accepted[0].name),
        };
        if let Err(e) = exec.edit(&edit) {
            report.warn(Step::Locale, e.to_string(), format!("set LANG in {}", paths.locale_conf.display()));
        }
    }

    info!(count = accepted.len(), "locales configured");
    Ok(())
}
