//! Default values for provisioning settings and init configuration.
//!
//! These are only defaults: the orchestrator reads every value from
//! [`ProvisionSettings`](crate::config::ProvisionSettings).

/// Image the automation container is created from.
pub const DEFAULT_IMAGE: &str = "datastax/zdm-ansible:2.1.0-rc1";

/// Logical name of the managed container.
pub const DEFAULT_CONTAINER_NAME: &str = "zdm-ansible-container";

/// Directory inside the container that receives the SSH key.
pub const DEFAULT_SSH_KEY_DIR_IN_CONTAINER: &str = "/home/ubuntu/zdm-proxy-ssh-key-dir";

/// Directory inside the container that receives the Ansible inventory.
pub const DEFAULT_INVENTORY_DIR_IN_CONTAINER: &str = "/home/ubuntu";

/// Script executed inside a freshly started container.
pub const DEFAULT_INIT_SCRIPT: &str = "/home/ubuntu/init_container_internal.sh";

/// Non-root user the init script runs as.
pub const DEFAULT_EXEC_USER: &str = "ubuntu";

/// Working directory of the init script.
pub const DEFAULT_EXEC_WORKING_DIR: &str = "/home/ubuntu";

/// Default number of connectivity probe retries after the first attempt.
pub const DEFAULT_PROBE_MAX_RETRIES: u32 = 5;

/// Default delay between connectivity probe attempts, in milliseconds.
pub const DEFAULT_PROBE_DELAY_MS: u64 = 1_000;

/// Default number of attempts for interactive prompts.
pub const DEFAULT_PROMPT_ATTEMPTS: u32 = 5;

/// Init configuration file looked up in the working directory.
pub const DEFAULT_INIT_CONFIG_FILE: &str = "ansible_container_init_config";

/// Directory searched for a pre-existing inventory file.
pub const DEFAULT_INVENTORY_DIR: &str = "/home/ubuntu/";

/// File name of a generated Ansible inventory.
pub const DEFAULT_INVENTORY_FILE_NAME: &str = "cloudgate_inventory";

/// Application name used in CLI output.
pub const APP_NAME: &str = "ctlhost";
