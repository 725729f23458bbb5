//! Post-processing remap of `*.mpco.cdata` files
//!
//! The recorder's cdata file describes elements by id: local axes, section
//! offsets, beam profiles and element info. When the writer expands one
//! model element into several solver elements, the generated ids must carry
//! the same rows, otherwise post-processing cannot draw them. Rows are only
//! ever appended: the reader keeps the last row per element, so an appended
//! row overrides the original.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::context::CdataRemap;
use crate::error::CdataError;

pub const CDATA_SUFFIX: &str = "mpco.cdata";

const HEADER_PATTERN: &str = r"^\*[A-Z_]+\s*$";
const BEAM_PROFILE_ASSIGNMENT: &str = "*BEAM_PROFILE_ASSIGNMENT";
const ELEMENT_INFO: &str = "*ELEMENT_INFO";
const COUNTED_BLOCKS: [&str; 4] = ["*LOCAL_AXES", "*SECTION_OFFSET", BEAM_PROFILE_ASSIGNMENT, ELEMENT_INFO];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CdataReport {
    pub files: Vec<PatchedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchedFile {
    pub path: PathBuf,
    /// Appended rows per block header
    pub appended_rows: BTreeMap<String, usize>,
}

impl CdataReport {
    pub fn total_appended(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| f.appended_rows.values())
            .sum()
    }
}

/// Patch every cdata file in `dir` with the remap collected during emission.
pub fn apply_remap(dir: &Path, remap: &CdataRemap) -> Result<CdataReport, CdataError> {
    let mut report = CdataReport::default();
    if !remap.is_dirty() {
        return Ok(report);
    }

    let header = Regex::new(HEADER_PATTERN)?;
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(CDATA_SUFFIX))
        })
        .collect();
    paths.sort();

    for path in paths {
        let text = fs::read_to_string(&path)?;
        let file = path.display().to_string();
        let (patched, appended_rows) = remap_text(&header, &file, &text, remap)?;
        if appended_rows.is_empty() {
            tracing::debug!("{} needs no remap", file);
            continue;
        }

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(patched.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)?;
        tracing::info!(
            "Patched {} ({} rows appended)",
            file,
            appended_rows.values().sum::<usize>()
        );
        report.files.push(PatchedFile { path, appended_rows });
    }

    Ok(report)
}

/// Rewrite one cdata document. Returns the new text and the appended rows per block.
///
/// Original lines are copied byte for byte. Appended rows and rewritten
/// counts take the line ending of the file (`\r\n` if it has any).
pub fn remap_text(
    header: &Regex,
    file: &str,
    text: &str,
    remap: &CdataRemap,
) -> Result<(String, BTreeMap<String, usize>), CdataError> {
    let cr = if text.contains("\r\n") { "\r" } else { "" };
    let mut raw: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') || text.is_empty() {
        raw.pop();
    }
    let lines: Vec<&str> = raw.iter().map(|&l| l.strip_suffix('\r').unwrap_or(l)).collect();
    let malformed = |line: usize, reason: String| CdataError::Malformed {
        file: file.to_string(),
        line: line + 1,
        reason,
    };

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut appended = BTreeMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let name = line.trim_end();
        if !header.is_match(line) || !COUNTED_BLOCKS.contains(&name) {
            out.push(raw[i].to_string());
            i += 1;
            continue;
        }

        out.push(raw[i].to_string());
        let count_at = i + 1;
        let count_line = lines
            .get(count_at)
            .ok_or_else(|| malformed(i, format!("{} has no count line", name)))?;
        let count: usize = count_line
            .trim()
            .parse()
            .map_err(|_| malformed(count_at, format!("invalid row count '{}'", count_line.trim())))?;
        let rows_start = count_at + 1;
        if rows_start + count > lines.len() {
            return Err(malformed(
                lines.len().saturating_sub(1),
                format!("{} announces {} rows, found {}", name, count, lines.len() - rows_start),
            ));
        }
        let rows = &lines[rows_start..rows_start + count];

        let mut extra = Vec::new();
        for (offset, row) in rows.iter().enumerate() {
            let at = rows_start + offset;
            let (element, rest) = split_first_token(row).ok_or_else(|| malformed(at, "empty row".into()))?;
            let element: u64 = element
                .parse()
                .map_err(|_| malformed(at, format!("invalid element id '{}'", element)))?;
            if name == ELEMENT_INFO {
                check_element_info(row).map_err(|reason| malformed(at, reason))?;
            }

            if name == BEAM_PROFILE_ASSIGNMENT {
                let (property, tail) =
                    split_first_token(rest).ok_or_else(|| malformed(at, "missing property id".into()))?;
                let property: u64 = property
                    .parse()
                    .map_err(|_| malformed(at, format!("invalid property id '{}'", property)))?;
                let substitute = |target: u64| {
                    remap
                        .physical_property_remap
                        .get(&property)
                        .and_then(|by_element| by_element.get(&target))
                        .copied()
                };
                let profile_row = |target: u64, prop: u64| join_row(target, &join_row(prop, tail));

                if let Some(generated) = remap.element_remap.get(&element) {
                    for g in generated {
                        extra.push(profile_row(*g, substitute(*g).unwrap_or(property)));
                    }
                }
                if let Some(new_property) = substitute(element) {
                    extra.push(profile_row(element, new_property));
                }
            } else if let Some(generated) = remap.element_remap.get(&element) {
                for g in generated {
                    extra.push(join_row(*g, rest));
                }
            }
        }

        if extra.is_empty() {
            out.push(raw[count_at].to_string());
        } else {
            out.push(format!("{}{}", count + extra.len(), cr));
            *appended.entry(name.to_string()).or_insert(0) += extra.len();
        }
        out.extend(raw[rows_start..rows_start + count].iter().map(|r| r.to_string()));
        out.extend(extra.into_iter().map(|row| row + cr));
        i = rows_start + count;
    }

    let mut patched = out.join("\n");
    if text.ends_with('\n') {
        patched.push('\n');
    }
    Ok((patched, appended))
}

/// Split `"12 rest of row"` into `("12", "rest of row")`.
fn split_first_token(row: &str) -> Option<(&str, &str)> {
    let row = row.trim_start();
    if row.is_empty() {
        return None;
    }
    match row.find(char::is_whitespace) {
        Some(end) => Some((&row[..end], row[end..].trim_start())),
        None => Some((row, "")),
    }
}

fn join_row(id: u64, rest: &str) -> String {
    if rest.is_empty() {
        id.to_string()
    } else {
        format!("{} {}", id, rest)
    }
}

/// `id len name` where name is exactly `len` characters.
///
/// The name is everything after the single space following `len`, so
/// leading and trailing blanks count.
fn check_element_info(row: &str) -> Result<(), String> {
    let fields = row.trim_start().split_once(' ').map(|(_, rest)| rest.trim_start());
    let (len, name) = fields
        .and_then(|rest| match rest.split_once(' ') {
            Some((len, name)) => Some((len, name)),
            None if !rest.is_empty() => Some((rest, "")),
            None => None,
        })
        .ok_or_else(|| "missing name length".to_string())?;
    let len: usize = len.parse().map_err(|_| format!("invalid name length '{}'", len))?;
    let actual = name.chars().count();
    if actual != len {
        return Err(format!("name '{}' has {} characters, expected {}", name, actual, len));
    }
    Ok(())
}
