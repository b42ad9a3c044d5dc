//! Reconciliation of the managed container's lifecycle.
//!
//! The controller walks a small state machine from what the resolver found
//! to one of two terminal states: [`LifecycleState::ReadyReuse`], where the
//! run ends without touching the container, and
//! [`LifecycleState::ReadyFresh`], where files are staged and the init
//! script runs.
//!
//! ```text
//! Absent ──create──> Created ──start──> Started ──> ReadyFresh
//! ExistsStopped ─────start────────────> Started
//! ExistsRunning ──use existing──> ReadyReuse
//!               ──recreate, confirmed──remove──> Absent
//!               ──recreate, declined─────────> ReadyReuse
//! ```

use std::fmt;
use std::io::Write;

use ctlhost_common::config::ProvisionSettings;
use ctlhost_common::prompt::{Confirm, PromptError, YesNo};
use ctlhost_common::types::{ContainerId, ContainerRecord};

use crate::api::{ContainerRuntime, ContainerSpec, RestartPolicy};
use crate::error::{ProvisionError, Result};

const USE_EXISTING_QUESTION: &str = "Do you wish to use this existing container?";
const USE_EXISTING_CONTEXT: &str =
    "found existing container, but it is not clear whether you wish to use it or recreate it";
const RECREATE_QUESTION: &str = "You decided to remove and recreate the container. \
     All its data and configuration will be lost. Are you sure you want to proceed?";
const RECREATE_CONTEXT: &str = "found existing container. You indicated that you do not wish \
     to use it, but no clear confirmation was given about proceeding to destroy and recreate it";

/// Position of the managed container in the reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// No container with the logical name exists.
    Absent,
    /// The container exists and is running.
    ExistsRunning(ContainerId),
    /// The container exists but is not running.
    ExistsStopped(ContainerId),
    /// The container was created in this run.
    Created(ContainerId),
    /// The container was started in this run.
    Started(ContainerId),
    /// The existing container is kept as is.
    ReadyReuse(ContainerId),
    /// The container is freshly started and needs staging and init.
    ReadyFresh(ContainerId),
}

impl LifecycleState {
    /// Initial state for what the resolver reported.
    #[must_use]
    pub fn from_record(record: Option<&ContainerRecord>) -> Self {
        match record {
            None => Self::Absent,
            Some(r) if r.is_running => Self::ExistsRunning(r.id.clone()),
            Some(r) => Self::ExistsStopped(r.id.clone()),
        }
    }

    /// The outcome, once a terminal state is reached.
    #[must_use]
    pub fn ready(&self) -> Option<Ready> {
        match self {
            Self::ReadyReuse(id) => Some(Ready::Reuse(id.clone())),
            Self::ReadyFresh(id) => Some(Ready::Fresh(id.clone())),
            _ => None,
        }
    }
}

/// Terminal outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ready {
    /// Keep the existing container; skip staging and init.
    Reuse(ContainerId),
    /// The container was (re)started; stage files and run init.
    Fresh(ContainerId),
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::ExistsRunning(_) => "exists-running",
            Self::ExistsStopped(_) => "exists-stopped",
            Self::Created(_) => "created",
            Self::Started(_) => "started",
            Self::ReadyReuse(_) => "ready-reuse",
            Self::ReadyFresh(_) => "ready-fresh",
        };
        f.write_str(name)
    }
}

/// Drives the container from its resolved state to a terminal state.
pub struct LifecycleController<'a, R, C, W> {
    runtime: &'a R,
    confirm: &'a mut C,
    out: &'a mut W,
    settings: &'a ProvisionSettings,
}

impl<'a, R, C, W> LifecycleController<'a, R, C, W>
where
    R: ContainerRuntime,
    C: Confirm,
    W: Write,
{
    /// Creates a controller writing status messages to `out`.
    pub const fn new(
        runtime: &'a R,
        confirm: &'a mut C,
        out: &'a mut W,
        settings: &'a ProvisionSettings,
    ) -> Self {
        Self {
            runtime,
            confirm,
            out,
            settings,
        }
    }

    /// Steps from `initial` until a terminal state is reached.
    ///
    /// # Errors
    ///
    /// Returns the first removal, creation, start or confirmation failure.
    pub async fn reconcile(&mut self, initial: LifecycleState) -> Result<Ready> {
        let mut state = initial;
        loop {
            if let Some(ready) = state.ready() {
                return Ok(ready);
            }
            let next = self.step(state.clone()).await?;
            tracing::debug!(from = %state, to = %next, "lifecycle transition");
            state = next;
        }
    }

    async fn step(&mut self, state: LifecycleState) -> Result<LifecycleState> {
        match state {
            LifecycleState::Absent => self.create().await.map(LifecycleState::Created),
            LifecycleState::Created(id) | LifecycleState::ExistsStopped(id) => {
                self.start(&id).await?;
                Ok(LifecycleState::Started(id))
            }
            LifecycleState::Started(id) => Ok(LifecycleState::ReadyFresh(id)),
            LifecycleState::ExistsRunning(id) => self.decide_on_running(id).await,
            terminal @ (LifecycleState::ReadyReuse(_) | LifecycleState::ReadyFresh(_)) => {
                Ok(terminal)
            }
        }
    }

    async fn decide_on_running(&mut self, id: ContainerId) -> Result<LifecycleState> {
        let name = &self.settings.container_name;
        self.say(&format!(
            "\nThe container {name} already exists and is in running state.\n\n\
             If you are happy to use the existing container, this utility will exit.\n\
             Otherwise, this utility will destroy the existing container and recreate it from \
             scratch. Note: in this case, all data and configuration in the container will be lost.\n"
        ))?;

        if self.ask(USE_EXISTING_QUESTION, None, USE_EXISTING_CONTEXT)? {
            self.say("You decided to use the existing container.")?;
            return Ok(LifecycleState::ReadyReuse(id));
        }

        self.say("")?;
        if !self.ask(RECREATE_QUESTION, Some(false), RECREATE_CONTEXT)? {
            self.say("You decided to use the existing container.")?;
            return Ok(LifecycleState::ReadyReuse(id));
        }

        self.runtime
            .remove_container(&id)
            .await
            .map_err(|source| ProvisionError::ContainerRemove {
                id: id.clone(),
                source,
            })?;
        tracing::info!(%id, "container removed");
        self.say("Container successfully removed")?;
        Ok(LifecycleState::Absent)
    }

    async fn create(&mut self) -> Result<ContainerId> {
        let spec = ContainerSpec {
            name: self.settings.container_name.clone(),
            image: self.settings.image_reference(),
            tty: true,
            restart_policy: RestartPolicy::UnlessStopped,
        };
        let id = self
            .runtime
            .create_container(&spec)
            .await
            .map_err(|source| ProvisionError::ContainerCreate {
                name: spec.name.clone(),
                source,
            })?;
        tracing::info!(%id, name = %spec.name, image = %spec.image, "container created");
        self.say(&format!(
            "Container successfully created with ID {id} and name {}",
            spec.name
        ))?;
        Ok(id)
    }

    async fn start(&mut self, id: &ContainerId) -> Result<()> {
        self.runtime
            .start_container(id)
            .await
            .map_err(|source| ProvisionError::ContainerStart {
                id: id.clone(),
                source,
            })?;
        tracing::info!(%id, "container started");
        self.say("Container successfully started")
    }

    fn ask(&mut self, message: &str, default: Option<bool>, context: &'static str) -> Result<bool> {
        let question = YesNo {
            message,
            default,
            max_attempts: self.settings.prompt.max_attempts,
        };
        match self.confirm.ask_yes_no(&question) {
            Ok(answer) => Ok(answer),
            Err(PromptError::NoValidAnswer { attempts }) if self.settings.prompt.unanswered_is_decline => {
                tracing::warn!(attempts, question = message, "no clear answer, treating as no");
                Ok(false)
            }
            Err(source) => Err(ProvisionError::Confirmation { context, source }),
        }
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.out, "{message}").map_err(ProvisionError::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeRuntime, ScriptedConfirm};

    fn record(id: &str, is_running: bool) -> ContainerRecord {
        ContainerRecord {
            id: ContainerId::new(id),
            name: "ansible-control".into(),
            is_running,
        }
    }

    async fn reconcile_with(
        runtime: &FakeRuntime,
        confirm: &mut ScriptedConfirm,
        settings: &ProvisionSettings,
        initial: LifecycleState,
    ) -> Result<Ready> {
        let mut out = Vec::new();
        LifecycleController::new(runtime, confirm, &mut out, settings)
            .reconcile(initial)
            .await
    }

    #[test]
    fn initial_state_follows_record() {
        assert_eq!(LifecycleState::from_record(None), LifecycleState::Absent);
        assert_eq!(
            LifecycleState::from_record(Some(&record("a", true))),
            LifecycleState::ExistsRunning(ContainerId::new("a"))
        );
        assert_eq!(
            LifecycleState::from_record(Some(&record("a", false))),
            LifecycleState::ExistsStopped(ContainerId::new("a"))
        );
    }

    #[tokio::test]
    async fn absent_container_is_created_and_started() {
        let runtime = FakeRuntime::new().with_created_id("abc123");
        let settings = ProvisionSettings::default();
        let state = reconcile_with(
            &runtime,
            &mut ScriptedConfirm::default(),
            &settings,
            LifecycleState::Absent,
        )
        .await
        .expect("reconciled");
        assert_eq!(state, Ready::Fresh(ContainerId::new("abc123")));
        let spec = runtime.created_specs().pop().expect("created");
        assert!(spec.tty);
        assert_eq!(spec.restart_policy, RestartPolicy::UnlessStopped);
        assert_eq!(spec.name, settings.container_name);
        assert_eq!(runtime.count(&Call::StartContainer(String::new())), 1);
    }

    #[tokio::test]
    async fn stopped_container_is_only_started() {
        let runtime = FakeRuntime::new();
        let state = reconcile_with(
            &runtime,
            &mut ScriptedConfirm::default(),
            &ProvisionSettings::default(),
            LifecycleState::ExistsStopped(ContainerId::new("abc123")),
        )
        .await
        .expect("reconciled");
        assert_eq!(state, Ready::Fresh(ContainerId::new("abc123")));
        assert_eq!(runtime.calls(), vec![Call::StartContainer("abc123".into())]);
    }

    #[tokio::test]
    async fn declined_recreate_keeps_running_container() {
        let runtime = FakeRuntime::new();
        let mut confirm = ScriptedConfirm::answering([Ok(false), Ok(false)]);
        let state = reconcile_with(
            &runtime,
            &mut confirm,
            &ProvisionSettings::default(),
            LifecycleState::ExistsRunning(ContainerId::new("abc123")),
        )
        .await
        .expect("reconciled");
        assert_eq!(state, Ready::Reuse(ContainerId::new("abc123")));
        assert!(runtime.calls().is_empty());
        assert_eq!(confirm.defaults_seen(), vec![None, Some(false)]);
    }

    #[tokio::test]
    async fn unanswered_prompt_is_fatal_by_default() {
        let runtime = FakeRuntime::new();
        let mut confirm = ScriptedConfirm::answering([Err(5)]);
        let err = reconcile_with(
            &runtime,
            &mut confirm,
            &ProvisionSettings::default(),
            LifecycleState::ExistsRunning(ContainerId::new("abc123")),
        )
        .await
        .expect_err("unanswered");
        assert!(matches!(
            err,
            ProvisionError::Confirmation {
                context: USE_EXISTING_CONTEXT,
                ..
            }
        ));
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn unanswered_prompt_can_count_as_decline() {
        let runtime = FakeRuntime::new();
        let mut settings = ProvisionSettings::default();
        settings.prompt.unanswered_is_decline = true;
        let mut confirm = ScriptedConfirm::answering([Err(5), Err(5)]);
        let state = reconcile_with(
            &runtime,
            &mut confirm,
            &settings,
            LifecycleState::ExistsRunning(ContainerId::new("abc123")),
        )
        .await
        .expect("reconciled");
        assert_eq!(state, Ready::Reuse(ContainerId::new("abc123")));
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn removal_failure_is_fatal() {
        let runtime = FakeRuntime::new().with_failing_remove();
        let mut confirm = ScriptedConfirm::answering([Ok(false), Ok(true)]);
        let err = reconcile_with(
            &runtime,
            &mut confirm,
            &ProvisionSettings::default(),
            LifecycleState::ExistsRunning(ContainerId::new("abc123")),
        )
        .await
        .expect_err("remove fails");
        assert!(matches!(err, ProvisionError::ContainerRemove { .. }));
        assert_eq!(runtime.count(&Call::CreateContainer), 0);
    }

    #[tokio::test]
    async fn start_failure_is_fatal() {
        let runtime = FakeRuntime::new()
            .with_created_id("abc123")
            .with_failing_start();
        let err = reconcile_with(
            &runtime,
            &mut ScriptedConfirm::default(),
            &ProvisionSettings::default(),
            LifecycleState::Absent,
        )
        .await
        .expect_err("start fails");
        assert!(matches!(err, ProvisionError::ContainerStart { ref id, .. } if id.as_str() == "abc123"));
        assert_eq!(
            runtime.calls(),
            vec![Call::CreateContainer, Call::StartContainer("abc123".into())]
        );
    }
}
