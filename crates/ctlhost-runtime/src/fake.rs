//! Recording in-memory runtime and scripted confirmations for tests.

use std::collections::{HashSet, VecDeque};
use std::mem::discriminant;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use ctlhost_common::prompt::{Confirm, PromptError, YesNo};
use ctlhost_common::types::{ContainerId, ImageReference};
use futures_util::StreamExt;

use crate::api::{
    ArchiveStream, ContainerListing, ContainerRuntime, ContainerSpec, ExecSpec, ImageListing,
    OutputStream, PathKind, PathStat, PullProgress, PullStream,
};
use crate::error::{RuntimeError, RuntimeResult};

/// A daemon call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ping,
    ListImages,
    PullImage,
    ListContainers,
    CreateContainer,
    StartContainer(String),
    RemoveContainer(String),
    StatPath(String),
    Upload(String),
    Inspect(String),
    CreateExec(Vec<String>),
    StartExec(String),
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    failed_pings: u32,
    images: Vec<ImageListing>,
    failing_pull: bool,
    containers: Vec<ContainerListing>,
    created_ids: VecDeque<String>,
    created_specs: Vec<ContainerSpec>,
    failing_create: bool,
    failing_start: bool,
    failing_remove: bool,
    directories: HashSet<String>,
    failing_stat: bool,
    failing_upload: bool,
    uploads: Vec<(String, Vec<String>)>,
    failing_inspect: bool,
    failing_create_exec: bool,
    failing_start_exec: bool,
    exec_id: Option<String>,
    exec_specs: Vec<ExecSpec>,
    exec_output: Vec<&'static str>,
    broken_exec_output: bool,
}

fn daemon_error(operation: &'static str) -> RuntimeError {
    RuntimeError::Daemon {
        operation,
        message: "injected failure".into(),
    }
}

/// In-memory [`ContainerRuntime`] that records every call and keeps a
/// minimal container table so repeated runs observe earlier ones.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn configure(mut self, apply: impl FnOnce(&mut State)) -> Self {
        apply(self.state.get_mut().unwrap());
        self
    }

    pub fn with_failed_pings(self, count: u32) -> Self {
        self.configure(|s| s.failed_pings = count)
    }

    pub fn with_local_image(self) -> Self {
        self.configure(|s| {
            s.images.push(ImageListing {
                id: "sha256:5d1c".into(),
                repo_tags: vec!["img:1".into()],
            });
        })
    }

    pub fn with_failing_pull(self) -> Self {
        self.configure(|s| s.failing_pull = true)
    }

    pub fn with_container(self, id: &str, state: &str) -> Self {
        self.configure(|s| {
            s.containers.push(ContainerListing {
                id: id.into(),
                state: state.into(),
            });
        })
    }

    pub fn with_created_id(self, id: &str) -> Self {
        self.configure(|s| s.created_ids.push_back(id.into()))
    }

    pub fn with_failing_create(self) -> Self {
        self.configure(|s| s.failing_create = true)
    }

    pub fn with_failing_start(self) -> Self {
        self.configure(|s| s.failing_start = true)
    }

    pub fn with_failing_remove(self) -> Self {
        self.configure(|s| s.failing_remove = true)
    }

    pub fn with_directory(self, path: &str) -> Self {
        self.configure(|s| {
            let _ = s.directories.insert(path.into());
        })
    }

    pub fn with_failing_stat(self) -> Self {
        self.configure(|s| s.failing_stat = true)
    }

    pub fn with_failing_upload(self) -> Self {
        self.configure(|s| s.failing_upload = true)
    }

    pub fn with_failing_inspect(self) -> Self {
        self.configure(|s| s.failing_inspect = true)
    }

    pub fn with_failing_create_exec(self) -> Self {
        self.configure(|s| s.failing_create_exec = true)
    }

    pub fn with_failing_start_exec(self) -> Self {
        self.configure(|s| s.failing_start_exec = true)
    }

    pub fn with_exec_id(self, id: &str) -> Self {
        self.configure(|s| s.exec_id = Some(id.into()))
    }

    pub fn with_exec_output(self, chunks: &[&'static str]) -> Self {
        self.configure(|s| s.exec_output = chunks.to_vec())
    }

    pub fn with_broken_exec_output(self) -> Self {
        self.configure(|s| s.broken_exec_output = true)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Counts calls of the same kind as `call`, ignoring its payload.
    pub fn count(&self, call: &Call) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| discriminant(*c) == discriminant(call))
            .count()
    }

    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state().created_specs.clone()
    }

    pub fn exec_specs(&self) -> Vec<ExecSpec> {
        self.state().exec_specs.clone()
    }

    /// Extraction directory and top-level entry names of every upload.
    pub fn uploads(&self) -> Vec<(String, Vec<String>)> {
        self.state().uploads.clone()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> RuntimeResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Ping);
        if state.failed_pings > 0 {
            state.failed_pings -= 1;
            return Err(daemon_error("ping"));
        }
        Ok(())
    }

    async fn list_images(&self, _reference: &ImageReference) -> RuntimeResult<Vec<ImageListing>> {
        let mut state = self.state();
        state.calls.push(Call::ListImages);
        Ok(state.images.clone())
    }

    fn pull_image(&self, _reference: &ImageReference) -> PullStream<'_> {
        let mut state = self.state();
        state.calls.push(Call::PullImage);
        let last = if state.failing_pull {
            Err(daemon_error("pull_image"))
        } else {
            Ok(PullProgress {
                id: Some("3f4ca61aafcd".into()),
                status: Some("Pull complete".into()),
                progress: None,
            })
        };
        let items = vec![
            Ok(PullProgress {
                status: Some("Pulling from datastax/zdm-ansible".into()),
                ..PullProgress::default()
            }),
            last,
        ];
        futures_util::stream::iter(items).boxed()
    }

    async fn list_containers(&self, _name: &str) -> RuntimeResult<Vec<ContainerListing>> {
        let mut state = self.state();
        state.calls.push(Call::ListContainers);
        Ok(state.containers.clone())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RuntimeResult<ContainerId> {
        let mut state = self.state();
        state.calls.push(Call::CreateContainer);
        if state.failing_create {
            return Err(daemon_error("create_container"));
        }
        state.created_specs.push(spec.clone());
        let id = state
            .created_ids
            .pop_front()
            .unwrap_or_else(|| format!("container-{}", state.created_specs.len()));
        state.containers.push(ContainerListing {
            id: id.clone(),
            state: "created".into(),
        });
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        let mut state = self.state();
        state.calls.push(Call::StartContainer(id.to_string()));
        if state.failing_start {
            return Err(daemon_error("start_container"));
        }
        for container in state.containers.iter_mut().filter(|c| c.id == id.as_str()) {
            container.state = "running".into();
        }
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        let mut state = self.state();
        state.calls.push(Call::RemoveContainer(id.to_string()));
        if state.failing_remove {
            return Err(daemon_error("remove_container"));
        }
        state.containers.retain(|c| c.id != id.as_str());
        Ok(())
    }

    async fn stat_path(&self, _id: &ContainerId, path: &str) -> RuntimeResult<Option<PathStat>> {
        let mut state = self.state();
        state.calls.push(Call::StatPath(path.into()));
        if state.failing_stat {
            return Err(daemon_error("stat_path"));
        }
        Ok(state.directories.contains(path).then_some(PathStat {
            kind: PathKind::Directory,
            mode: 0o755,
        }))
    }

    async fn upload_archive(
        &self,
        _id: &ContainerId,
        dest_dir: &str,
        mut archive: ArchiveStream,
    ) -> RuntimeResult<()> {
        self.record(Call::Upload(dest_dir.into()));
        if self.state().failing_upload {
            return Err(daemon_error("upload_archive"));
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = archive.next().await {
            let chunk: Bytes = chunk.map_err(|source| RuntimeError::Io {
                operation: "upload_archive",
                source,
            })?;
            bytes.extend_from_slice(&chunk);
        }
        let mut entries = Vec::new();
        for entry in tar::Archive::new(bytes.as_slice()).entries().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            entries.push(path.trim_end_matches('/').to_owned());
        }
        self.state().uploads.push((dest_dir.into(), entries));
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> RuntimeResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Inspect(id.to_string()));
        if state.failing_inspect {
            return Err(daemon_error("inspect_container"));
        }
        Ok(())
    }

    async fn create_exec(&self, _id: &ContainerId, spec: &ExecSpec) -> RuntimeResult<String> {
        let mut state = self.state();
        state.calls.push(Call::CreateExec(spec.command.clone()));
        if state.failing_create_exec {
            return Err(daemon_error("create_exec"));
        }
        state.exec_specs.push(spec.clone());
        Ok(state.exec_id.clone().unwrap_or_else(|| "exec-1".into()))
    }

    async fn start_exec(&self, exec_id: &str, _tty: bool) -> RuntimeResult<OutputStream> {
        let mut state = self.state();
        state.calls.push(Call::StartExec(exec_id.into()));
        if state.failing_start_exec {
            return Err(daemon_error("start_exec"));
        }
        let mut items: Vec<RuntimeResult<Bytes>> = state
            .exec_output
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        if state.broken_exec_output {
            items.push(Err(daemon_error("exec_output")));
        }
        Ok(futures_util::stream::iter(items).boxed())
    }
}

/// [`Confirm`] answering from a script; `Err(attempts)` simulates a user
/// who never gave a clear answer.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<Result<bool, u32>>,
    asked: Vec<(String, Option<bool>)>,
}

impl ScriptedConfirm {
    pub fn answering(answers: impl IntoIterator<Item = Result<bool, u32>>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    pub fn defaults_seen(&self) -> Vec<Option<bool>> {
        self.asked.iter().map(|(_, default)| *default).collect()
    }

    pub fn questions(&self) -> Vec<String> {
        self.asked.iter().map(|(message, _)| message.clone()).collect()
    }
}

impl Confirm for ScriptedConfirm {
    fn ask_yes_no(&mut self, question: &YesNo<'_>) -> Result<bool, PromptError> {
        self.asked
            .push((question.message.to_owned(), question.default));
        match self.answers.pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(attempts)) => Err(PromptError::NoValidAnswer { attempts }),
            None => panic!("unexpected question: {}", question.message),
        }
    }
}
