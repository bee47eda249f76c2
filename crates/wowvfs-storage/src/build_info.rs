//! `.build.info` parser for installation metadata.
//!
//! The `.build.info` file at the installation root is a pipe-separated
//! table. The first line names the columns (`Active!DEC:1`,
//! `Version!STRING:0`, ...), every other line is one installed build.
//! Columns are located by substring so the type suffixes and column order
//! do not matter.
//!
//! Columns read here:
//! - `Active` -- rows with `0` are skipped (required)
//! - `Version` -- `major.minor.patch.build` (required)
//! - `Tags` -- locale is the token before `text?` (optional)
//! - `Build Key`, `CDN Key`, `Product`, `Branch` (optional)

use crate::{Result, StorageError};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

#[allow(clippy::expect_used)]
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(\d+)").expect("version pattern is valid")
});

/// Product version of an installed build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BuildVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
    /// Build number
    pub build: u32,
}

impl BuildVersion {
    /// Create a version from its four parts
    pub const fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Parse the leading `a.b.c.d` of a version cell.
    ///
    /// Returns `None` when the cell does not start with four dot-separated
    /// decimal groups.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = VERSION_PATTERN.captures(text)?;
        let part = |index: usize| captures.get(index)?.as_str().parse::<u32>().ok();
        Some(Self::new(part(1)?, part(2)?, part(3)?, part(4)?))
    }

    /// `major.minor`, the directory name used for per-version data files
    pub fn short(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

/// The active build of an installation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildDescriptor {
    /// Product version, `0.0.0.0` when the cell does not parse
    pub version: BuildVersion,
    /// Locale code such as `enUS`, empty when no tag names one
    pub locale: String,
    /// Build config hash
    pub build_key: Option<String>,
    /// CDN config hash
    pub cdn_key: Option<String>,
    /// Product code (e.g. `wow_classic`)
    pub product: Option<String>,
    /// Branch name (e.g. `us`)
    pub branch: Option<String>,
}

struct Columns {
    width: usize,
    active: usize,
    version: usize,
    tags: Option<usize>,
    build_key: Option<usize>,
    cdn_key: Option<usize>,
    product: Option<usize>,
    branch: Option<usize>,
}

impl Columns {
    fn from_header(cells: &[&str]) -> Result<Self> {
        let find = |name: &str| cells.iter().position(|cell| cell.contains(name));
        Ok(Self {
            width: cells.len(),
            active: find("Active").ok_or(StorageError::MalformedHeader("Active"))?,
            version: find("Version").ok_or(StorageError::MalformedHeader("Version"))?,
            tags: find("Tags"),
            build_key: find("Build Key"),
            cdn_key: find("CDN Key"),
            product: find("Product"),
            branch: find("Branch"),
        })
    }
}

impl BuildDescriptor {
    /// Read and resolve a `.build.info` file.
    ///
    /// When `product` is set, rows for other products are skipped.
    pub fn resolve(path: &Path, product: Option<&str>) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let descriptor = Self::parse(&content, product)?;
        info!(
            "Resolved build {} ({}) from {}",
            descriptor.version,
            if descriptor.locale.is_empty() {
                "no locale"
            } else {
                &descriptor.locale
            },
            path.display()
        );
        Ok(descriptor)
    }

    /// Resolve the active build from manifest text.
    pub fn parse(content: &str, product: Option<&str>) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with("##"));

        let (_, header) = lines
            .next()
            .ok_or(StorageError::MalformedHeader("Active"))?;
        let header: Vec<&str> = header.split('|').collect();
        let columns = Columns::from_header(&header)?;

        for (index, line) in lines {
            let cells: Vec<&str> = line.split('|').collect();
            if cells.len() != columns.width {
                return Err(StorageError::ColumnMismatch {
                    line: index + 1,
                    expected: columns.width,
                    found: cells.len(),
                });
            }

            if cells[columns.active] == "0" {
                continue;
            }
            if let (Some(wanted), Some(column)) = (product, columns.product)
                && cells[column] != wanted
            {
                debug!("Skipping build row for product {}", cells[column]);
                continue;
            }

            let optional = |column: Option<usize>| {
                column
                    .map(|column| cells[column].trim())
                    .filter(|value| !value.is_empty())
                    .map(String::from)
            };

            return Ok(Self {
                version: BuildVersion::parse(cells[columns.version]).unwrap_or_default(),
                locale: columns
                    .tags
                    .and_then(|column| locale_from_tags(cells[column]))
                    .unwrap_or_default(),
                build_key: optional(columns.build_key),
                cdn_key: optional(columns.cdn_key),
                product: optional(columns.product),
                branch: optional(columns.branch),
            });
        }

        Err(StorageError::NoActiveRow)
    }
}

/// Locale named by the last `text?` tag group.
///
/// Tags look like `Windows code US? acct-US? enUS speech?:Windows ... enUS text?`.
fn locale_from_tags(tags: &str) -> Option<String> {
    tags.split(':')
        .filter(|token| token.contains("text?"))
        .filter_map(|token| {
            let pieces: Vec<&str> = token.split(' ').filter(|piece| !piece.is_empty()).collect();
            (pieces.len() >= 2).then(|| pieces[pieces.len() - 2].to_string())
        })
        .last()
}
