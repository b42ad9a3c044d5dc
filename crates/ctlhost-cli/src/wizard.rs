//! Interactive collection of the init configuration.
//!
//! Values come from a property file when one is given or accepted, and
//! whatever is still missing is asked for on the terminal. A newly
//! collected configuration is persisted next to the working directory so
//! the next run can reuse it.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use ctlhost_common::constants::{
    DEFAULT_INIT_CONFIG_FILE, DEFAULT_INVENTORY_DIR, DEFAULT_INVENTORY_FILE_NAME,
};
use ctlhost_common::init_config::{
    ANSIBLE_INVENTORY_PATH_ON_HOST, InitConfig, InitProperties, IpPrefix,
    PROXY_IP_ADDRESS_PREFIX, SSH_KEY_PATH_ON_HOST, is_valid_ip_address, validate_file_path,
};
use ctlhost_common::prompt::{Confirm, PromptError, TerminalPrompt, YesNo};

use crate::output;

const REQUIRED_NO_DEFAULT: &str =
    "This is a required parameter and does not have a default value.";
const PROVIDE_VALUE: &str = "Please provide a valid value.";
const MISSING_CONFIGURATION: &str = "missing required configuration";

fn file_path_validator(name: &'static str) -> impl FnMut(&str) -> Result<(), String> {
    move |value| validate_file_path(name, value).map(drop).map_err(|e| e.to_string())
}

fn ip_address_validator(value: &str) -> Result<(), String> {
    if is_valid_ip_address(value) {
        Ok(())
    } else {
        Err(format!("{value} is not a valid IP address"))
    }
}

/// Collects a complete [`InitProperties`] set.
pub struct Wizard<'a, R, W> {
    prompt: &'a mut TerminalPrompt<R, W>,
    max_attempts: u32,
    workdir: PathBuf,
    default_inventory: PathBuf,
}

impl<'a, R: BufRead, W: Write> Wizard<'a, R, W> {
    /// Creates a wizard that reads and writes its files in `workdir`.
    pub fn new(prompt: &'a mut TerminalPrompt<R, W>, max_attempts: u32, workdir: PathBuf) -> Self {
        Self {
            prompt,
            max_attempts,
            workdir,
            default_inventory: Path::new(DEFAULT_INVENTORY_DIR).join(DEFAULT_INVENTORY_FILE_NAME),
        }
    }

    #[cfg(test)]
    fn with_default_inventory(mut self, path: PathBuf) -> Self {
        self.default_inventory = path;
        self
    }

    fn say(&mut self, message: &str) -> anyhow::Result<()> {
        writeln!(self.prompt.output(), "{message}")?;
        Ok(())
    }

    fn yes_no(&mut self, message: &str, default: Option<bool>) -> Result<bool, PromptError> {
        let question = YesNo {
            message,
            default,
            max_attempts: self.max_attempts,
        };
        self.prompt.ask_yes_no(&question)
    }

    /// Loads `config_file` (or the default file, if the user accepts it)
    /// and asks for every missing property.
    ///
    /// # Errors
    ///
    /// Returns an error when a required property is never provided or a
    /// decisive question gets no clear answer.
    pub fn collect(&mut self, config_file: Option<&Path>) -> anyhow::Result<InitProperties> {
        output::write_banner(self.prompt.output())?;
        let mut properties = self.load_existing(config_file)?;
        self.say("")?;

        if !properties.is_fully_populated() {
            self.say("***** Running this utility in interactive mode. *****")?;
            self.say(&format!(
                "The results will be saved to a configuration file called {DEFAULT_INIT_CONFIG_FILE} \
                 and located in the current execution directory. This file can be passed to this \
                 utility if it needs to be run again."
            ))?;

            self.ask_ssh_key(&mut properties)?;
            self.say("")?;
            self.ask_ip_prefix(&mut properties)?;
            self.say("")?;
            self.ask_inventory(&mut properties)?;
            self.say("")?;

            let path = self.workdir.join(DEFAULT_INIT_CONFIG_FILE);
            match properties.persist(&path) {
                Ok(()) => self.say(&format!(
                    "Configuration successfully written to file {DEFAULT_INIT_CONFIG_FILE}"
                ))?,
                Err(e) => self.say(&format!(
                    "The configuration file {DEFAULT_INIT_CONFIG_FILE} could not be created due to {e}. \
                     This utility will continue without persisting its configuration."
                ))?,
            }
        }
        Ok(properties)
    }

    /// Shows the configuration and asks whether to go ahead.
    ///
    /// # Errors
    ///
    /// Returns an error if no clear answer is given or the properties are
    /// incomplete.
    pub fn confirm(&mut self, properties: &InitProperties) -> anyhow::Result<Option<InitConfig>> {
        output::write_properties(self.prompt.output(), properties)?;
        self.say("")?;
        let proceed = self
            .yes_no("Do you wish to proceed?", Some(true))
            .context("confirmation could not be obtained")?;
        if !proceed {
            return Ok(None);
        }
        Ok(Some(InitConfig::try_from(properties)?))
    }

    fn load_existing(&mut self, config_file: Option<&Path>) -> anyhow::Result<InitProperties> {
        let path = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = self.workdir.join(DEFAULT_INIT_CONFIG_FILE);
                let use_default = default.is_file()
                    && self
                        .yes_no(
                            &format!(
                                "Found existing configuration file {DEFAULT_INIT_CONFIG_FILE}. \
                                 Do you wish to use this file?"
                            ),
                            Some(true),
                        )
                        .context(
                            "no clear indication was given about whether to use the existing \
                             configuration file",
                        )?;
                use_default.then_some(default)
            }
        };
        let Some(path) = path else {
            return Ok(InitProperties::new());
        };

        let parsed = match InitProperties::load(&path) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.say(&format!(
                    "There was an error with the provided configuration file: {e}. \
                     This utility will now switch to using interactive input instead."
                ))?;
                return Ok(InitProperties::new());
            }
        };
        for rejected in &parsed.rejected {
            self.say(&format!("Ignoring invalid property: {rejected}"))?;
        }
        let properties = parsed.properties;
        self.say("Configuration file parsed.")?;
        if properties.is_empty() {
            self.say("No configuration properties were specified.")?;
        } else if !properties.is_fully_populated() {
            self.say("The configuration file was incomplete or not fully valid.")?;
        }
        Ok(properties)
    }

    fn ask_required(
        &mut self,
        message: &str,
        what: &str,
        validate: impl FnMut(&str) -> Result<(), String>,
    ) -> anyhow::Result<String> {
        let retry_hint = format!("{REQUIRED_NO_DEFAULT} {PROVIDE_VALUE}");
        let answer =
            self.prompt
                .ask_string(message, &retry_hint, false, self.max_attempts, validate)?;
        match answer {
            Some(value) => Ok(value),
            None => {
                self.say("")?;
                self.say(&format!("{what} was not provided or was not valid. {REQUIRED_NO_DEFAULT}"))?;
                bail!(MISSING_CONFIGURATION)
            }
        }
    }

    fn ask_ssh_key(&mut self, properties: &mut InitProperties) -> anyhow::Result<()> {
        if properties.contains(SSH_KEY_PATH_ON_HOST) {
            return Ok(());
        }
        let path = self.ask_required(
            "Please enter the path and name of the SSH private key to access the proxy hosts",
            "The SSH private key to access the proxy hosts",
            file_path_validator(SSH_KEY_PATH_ON_HOST),
        )?;
        properties.insert(SSH_KEY_PATH_ON_HOST, &path)?;
        Ok(())
    }

    fn ask_ip_prefix(&mut self, properties: &mut InitProperties) -> anyhow::Result<()> {
        if properties.contains(PROXY_IP_ADDRESS_PREFIX) {
            return Ok(());
        }
        let prefix = self.ask_required(
            "Please enter the common prefix of the private IP addresses of the proxy hosts \
             (examples: 172.* or 172.18.* or 172.18.10.*)",
            "The common prefix of the private IP addresses of the proxy hosts",
            |value| value.parse::<IpPrefix>().map(drop),
        )?;
        properties.insert(PROXY_IP_ADDRESS_PREFIX, &prefix)?;
        Ok(())
    }

    fn ask_inventory(&mut self, properties: &mut InitProperties) -> anyhow::Result<()> {
        if properties.contains(ANSIBLE_INVENTORY_PATH_ON_HOST) {
            return Ok(());
        }
        let has_inventory = self
            .yes_no("Do you have an existing Ansible inventory file?", None)
            .context(
                "no indication was given about whether an Ansible inventory file exists or \
                 should be created interactively",
            )?;

        let path = if has_inventory {
            self.say("")?;
            let default = self.default_inventory.to_string_lossy().into_owned();
            let answer = self.prompt.ask_string(
                &format!(
                    "Please enter the path and name of your Ansible inventory file. \
                     Simply press ENTER if your inventory is {default}"
                ),
                "",
                true,
                self.max_attempts,
                file_path_validator(ANSIBLE_INVENTORY_PATH_ON_HOST),
            )?;
            match answer.filter(|value| !value.is_empty()) {
                Some(value) => value,
                None if validate_file_path(ANSIBLE_INVENTORY_PATH_ON_HOST, &default).is_ok() => {
                    default
                }
                None => {
                    self.say(&format!("The Ansible inventory file path {default} is not valid."))?;
                    bail!(MISSING_CONFIGURATION)
                }
            }
        } else {
            self.say("")?;
            self.generate_inventory()?
        };
        properties.insert(ANSIBLE_INVENTORY_PATH_ON_HOST, &path)?;
        Ok(())
    }

    /// Asks for the proxy and monitoring addresses and writes a new
    /// inventory into the working directory.
    fn generate_inventory(&mut self) -> anyhow::Result<String> {
        self.say("This utility will create a new inventory file and populate it interactively.")?;
        self.say(&format!(
            "The file will be called {DEFAULT_INVENTORY_FILE_NAME} and will be located in the current directory"
        ))?;

        let local_testing = match self.yes_no(
            "Is this proxy deployment for local testing and evaluation?",
            Some(false),
        ) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(error = %e, "deployment type unanswered");
                self.say("\nNo valid answer was given, considering this a production deployment.")?;
                false
            }
        };

        let min_proxies = if local_testing { 1 } else { 3 };
        self.say("\nYou will now be prompted for the private IP addresses of all your proxy instances.")?;
        if local_testing {
            self.say("At least one proxy instance is required for local testing and evaluation purposes.")?;
        } else {
            self.say("At least three proxy instances are required for general testing and production deployments.")?;
        }
        self.say("")?;
        self.say("Please enter one address at a time and press ENTER. When you have finished, simply press ENTER.")?;

        let proxies = self
            .prompt
            .ask_until_empty("Proxy private IP address", ip_address_validator)?;
        if proxies.len() < min_proxies {
            self.say(&format!(
                "A minimum of {min_proxies} private IP addresses must be specified"
            ))?;
            bail!(MISSING_CONFIGURATION);
        }
        self.say("")?;
        let monitoring = self.prompt.ask_string(
            "Please enter the private IP address of your monitoring instance. \
             Simply press ENTER to leave it empty",
            "",
            true,
            self.max_attempts,
            ip_address_validator,
        )?;
        self.say("")?;

        let path = self.workdir.join(DEFAULT_INVENTORY_FILE_NAME);
        let inventory = output::render_inventory(
            &proxies,
            monitoring.as_deref().filter(|address| !address.is_empty()),
        );
        if let Err(e) = std::fs::write(&path, inventory) {
            self.say(&format!(
                "The creation of a new Ansible inventory file with name {DEFAULT_INVENTORY_FILE_NAME} \
                 in the current directory failed, due to {e}"
            ))?;
            bail!(MISSING_CONFIGURATION);
        }
        tracing::info!(path = %path.display(), proxies = proxies.len(), "inventory generated");
        self.say(&format!(
            "Ansible Inventory successfully written to file {}",
            path.display()
        ))?;
        Ok(path.to_string_lossy().into_owned())
    }
}
