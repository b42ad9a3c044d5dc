//! Formatted output helpers for CLI commands.

use std::io::{self, Write};

use ctlhost_common::init_config::InitProperties;

const BANNER_RULE: &str =
    "*******************************************************************************";

/// Writes the banner shown when `init` starts.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{BANNER_RULE}")?;
    writeln!(
        out,
        "*** This utility creates and initializes the Ansible Control Host container ***"
    )?;
    writeln!(out, "{BANNER_RULE}")?;
    writeln!(out)
}

/// Lists the collected configuration properties.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_properties(out: &mut impl Write, properties: &InitProperties) -> io::Result<()> {
    writeln!(out, "Configuration properties:")?;
    for (name, value) in properties.iter() {
        writeln!(out, " - {name}: {value}")?;
    }
    Ok(())
}

/// Renders an Ansible inventory with a `[proxies]` group and an optional
/// `[monitoring]` group.
#[must_use]
pub fn render_inventory(proxies: &[String], monitoring: Option<&str>) -> String {
    const SUFFIX: &str = "ansible_connection=ssh ansible_user=ubuntu";

    let mut inventory = String::from("[proxies]\n");
    for address in proxies {
        inventory.push_str(&format!("{address} {SUFFIX}\n"));
    }
    inventory.push('\n');
    if let Some(address) = monitoring {
        inventory.push_str(&format!("[monitoring]\n{address} {SUFFIX}\n"));
    }
    inventory
}
