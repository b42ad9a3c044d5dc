//! Init configuration: the three properties the init script needs.
//!
//! Properties come from a line-oriented file (`name: value` or
//! `name=value`) or from the interactive wizard. Every value is validated
//! and normalized on insertion, so an [`InitProperties`] map only ever
//! holds usable values and [`InitConfig`] can be built from it infallibly
//! once it is fully populated.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CtlhostError, Result};

/// Host path of the SSH private key used to reach the proxy hosts.
pub const SSH_KEY_PATH_ON_HOST: &str = "ssh_key_path_on_host";
/// Common prefix of the proxy hosts' private addresses, e.g. `172.18.*`.
pub const PROXY_IP_ADDRESS_PREFIX: &str = "proxy_ip_address_prefix";
/// Host path of the Ansible inventory file.
pub const ANSIBLE_INVENTORY_PATH_ON_HOST: &str = "ansible_inventory_path_on_host";

/// All recognized property names.
pub const PROPERTY_NAMES: [&str; 3] = [
    SSH_KEY_PATH_ON_HOST,
    PROXY_IP_ADDRESS_PREFIX,
    ANSIBLE_INVENTORY_PATH_ON_HOST,
];

const IP_PREFIX_EXAMPLE: &str = "Example: 172.* or 172.18.* or 172.18.10.*";

/// A validated address prefix: one to three numeric octets followed by `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpPrefix(String);

impl IpPrefix {
    /// Returns the prefix as written, e.g. `172.18.*`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IpPrefix {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let prefix = format_value(raw);
        let components: Vec<&str> = prefix.split('.').collect();

        if components.len() == 1 {
            return Err(format!(
                "malformed prefix {prefix}: at least one octet must be specified. {IP_PREFIX_EXAMPLE}"
            ));
        }
        if components.len() > 4 {
            return Err(format!(
                "malformed prefix {prefix}: too many octets were specified. {IP_PREFIX_EXAMPLE}"
            ));
        }
        if components.last() != Some(&"*") {
            return Err(format!(
                "malformed prefix {prefix}: the least significant component must be an asterisk. {IP_PREFIX_EXAMPLE}"
            ));
        }
        if prefix.matches('*').count() != 1 {
            return Err(format!(
                "malformed prefix {prefix}: exactly one asterisk must be present. {IP_PREFIX_EXAMPLE}"
            ));
        }

        let octets = &components[..components.len() - 1];
        let expanded = (0..4)
            .map(|i| octets.get(i).copied().unwrap_or("0"))
            .collect::<Vec<_>>()
            .join(".");
        if expanded.parse::<Ipv4Addr>().is_err() {
            return Err(format!(
                "malformed prefix {prefix}: one or more octets may be out of range. {IP_PREFIX_EXAMPLE}"
            ));
        }
        Ok(Self(prefix))
    }
}

/// Removes surrounding whitespace and one pair of enclosing double quotes.
#[must_use]
pub fn format_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
    trimmed.trim().to_owned()
}

/// Expands a leading `~/` and makes the path absolute.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn to_absolute_path(raw: &str) -> Result<PathBuf> {
    let expanded = match raw.strip_prefix("~/") {
        Some(rest) => std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_or_else(|_| PathBuf::from(raw), |home| PathBuf::from(home).join(rest)),
        None => PathBuf::from(raw),
    };
    std::path::absolute(&expanded).map_err(|e| CtlhostError::Io {
        path: expanded,
        source: e,
    })
}

/// Validates that `raw` names an existing regular file (not a directory)
/// and returns its absolute path.
///
/// # Errors
///
/// Returns [`CtlhostError::InvalidProperty`] if the file does not exist or
/// is a directory.
pub fn validate_file_path(name: &str, raw: &str) -> Result<PathBuf> {
    let path = to_absolute_path(raw)?;
    let invalid = |reason: String| CtlhostError::InvalidProperty {
        name: name.to_owned(),
        value: raw.to_owned(),
        reason,
    };
    let metadata = std::fs::metadata(&path).map_err(|e| invalid(format!("file is invalid: {e}")))?;
    if metadata.is_dir() {
        return Err(invalid("path is a directory, not a file".into()));
    }
    Ok(path)
}

/// Returns `true` if `raw` parses as an IPv4 or IPv6 address.
#[must_use]
pub fn is_valid_ip_address(raw: &str) -> bool {
    raw.parse::<IpAddr>().is_ok()
}

/// Validated init properties, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitProperties {
    values: BTreeMap<&'static str, String>,
}

/// Outcome of parsing a property file.
#[derive(Debug, Default)]
pub struct ParsedProperties {
    /// Properties that passed validation.
    pub properties: InitProperties,
    /// Recognized properties whose value was rejected.
    pub rejected: Vec<CtlhostError>,
    /// Names that are not recognized properties.
    pub unknown: Vec<String>,
}

impl InitProperties {
    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses property file content. Invalid and unknown entries are
    /// reported rather than failing the whole parse.
    #[must_use]
    pub fn parse(content: &str) -> ParsedProperties {
        let mut parsed = ParsedProperties::default();
        for line in content.lines() {
            let Some(idx) = separator_index(line) else {
                continue;
            };
            let name = format_value(&line[..idx]);
            if name.is_empty() {
                continue;
            }
            let value = format_value(&line[idx + 1..]);
            match parsed.properties.insert(&name, &value) {
                Ok(()) => {}
                Err(CtlhostError::Config { .. }) => {
                    tracing::warn!(%name, %value, "unknown property ignored");
                    parsed.unknown.push(name);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "property rejected");
                    parsed.rejected.push(e);
                }
            }
        }
        parsed
    }

    /// Reads and parses a property file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: &Path) -> Result<ParsedProperties> {
        let content = std::fs::read_to_string(path).map_err(|e| CtlhostError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::parse(&content))
    }

    /// Validates, normalizes, and stores a property.
    ///
    /// File paths are stored in absolute form; the prefix is stored trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`CtlhostError::Config`] for an unknown name and
    /// [`CtlhostError::InvalidProperty`] for a value that fails validation.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<()> {
        let (key, normalized) = match name {
            SSH_KEY_PATH_ON_HOST => (
                SSH_KEY_PATH_ON_HOST,
                validate_file_path(name, value)?.to_string_lossy().into_owned(),
            ),
            ANSIBLE_INVENTORY_PATH_ON_HOST => (
                ANSIBLE_INVENTORY_PATH_ON_HOST,
                validate_file_path(name, value)?.to_string_lossy().into_owned(),
            ),
            PROXY_IP_ADDRESS_PREFIX => {
                let prefix = value
                    .parse::<IpPrefix>()
                    .map_err(|reason| CtlhostError::InvalidProperty {
                        name: name.to_owned(),
                        value: value.to_owned(),
                        reason,
                    })?;
                (PROXY_IP_ADDRESS_PREFIX, prefix.0)
            }
            other => {
                return Err(CtlhostError::Config {
                    message: format!("unknown property {other}"),
                });
            }
        };
        let _ = self.values.insert(key, normalized);
        Ok(())
    }

    /// Returns the stored value of a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns whether a property has been set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns `true` if no property has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `true` if all three properties are present.
    #[must_use]
    pub fn is_fully_populated(&self) -> bool {
        PROPERTY_NAMES.iter().all(|name| self.values.contains_key(name))
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Writes the properties as `name: value` lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let io_err = |e| CtlhostError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(io_err)?);
        for (name, value) in self.iter() {
            writeln!(file, "{name}: {value}").map_err(io_err)?;
        }
        file.flush().map_err(io_err)?;
        tracing::info!(path = %path.display(), "init configuration persisted");
        Ok(())
    }
}

/// Locates the separator: the first `:` after position 0, else the first `=`.
fn separator_index(line: &str) -> Option<usize> {
    match line.find(':') {
        Some(idx) if idx > 0 => Some(idx),
        _ => line.find('='),
    }
}

/// Fully populated, validated init configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitConfig {
    /// Absolute host path of the SSH private key.
    pub ssh_key_path_on_host: PathBuf,
    /// Validated proxy address prefix.
    pub proxy_ip_address_prefix: IpPrefix,
    /// Absolute host path of the Ansible inventory.
    pub ansible_inventory_path_on_host: PathBuf,
}

impl InitConfig {
    /// File name of the inventory, as passed to the init script.
    #[must_use]
    pub fn inventory_file_name(&self) -> String {
        self.ansible_inventory_path_on_host
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }
}

impl TryFrom<&InitProperties> for InitConfig {
    type Error = CtlhostError;

    fn try_from(properties: &InitProperties) -> Result<Self> {
        let required = |name: &'static str| {
            properties
                .get(name)
                .ok_or(CtlhostError::MissingProperty { name })
        };
        Ok(Self {
            ssh_key_path_on_host: PathBuf::from(required(SSH_KEY_PATH_ON_HOST)?),
            proxy_ip_address_prefix: IpPrefix(required(PROXY_IP_ADDRESS_PREFIX)?.to_owned()),
            ansible_inventory_path_on_host: PathBuf::from(required(ANSIBLE_INVENTORY_PATH_ON_HOST)?),
        })
    }
}
