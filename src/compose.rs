//! The reconciliation loop that fills a project's missing env keys.
//!
//! [`Composer::run`] drives an explicit [`Phase`] machine over a
//! [`ReconcileState`]:
//!
//! ```text
//! CheckMissing ──resolved──▶ Finished
//!      │
//!      ▼
//! TryRemembered ──(unattended)──▶ Copy(remembered) ─▶ CheckMissing
//!      │
//!      ▼
//! SourceMenu ─▶ Copy(existing | bundle | remembered) ─▶ CheckMissing
//!            ─▶ AutoFill ─▶ Finished
//!            ─▶ ManualEdit ─▶ Finished
//! ```
//!
//! The missing set is recomputed from disk on every `CheckMissing`, and keys
//! written during the run are never offered again.

use std::collections::HashSet;
use std::path::{
    Path,
    PathBuf,
};

use tracing::{
    debug,
    error,
    info,
    warn,
};

use crate::catalog::{
    Catalog,
    KeySpec,
    ServiceDefinition,
};
use crate::error::ComposeResult;
use crate::fetch::ExampleFetcher;
use crate::memory::PathMemoryStore;
use crate::paths::DEFAULT_BUNDLE_DIR;
use crate::project::ProjectEnv;
use crate::prompt::{
    InputRequest,
    Prompter,
};
use crate::snapshot::strip_quotes;
use crate::validate::validate;

/// Inputs of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// Root of the scaffolded project.
    pub project_path: PathBuf,
    /// Where to fetch `.env.example` from if the template has none.
    pub fallback_example_url: Option<String>,
    /// Hide entered values and defaults.
    pub mask_input: bool,
    /// Resolve without asking anything.
    pub skip_prompts: bool,
    /// Offer the bundle-specific env file.
    pub bundle_mode: bool,
    /// Directory under `.config/` holding bundle env files.
    pub bundle_dir: String,
    /// Open service dashboards in the browser instead of printing links.
    pub open_browser: bool,
    /// Editor command for manual editing.
    pub editor: Option<String>,
}

impl ComposeOptions {
    /// Interactive defaults for the project at `project_path`.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            fallback_example_url: None,
            mask_input: false,
            skip_prompts: false,
            bundle_mode: false,
            bundle_dir: DEFAULT_BUNDLE_DIR.to_string(),
            open_browser: false,
            editor: None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    /// Every required key has a value.
    Complete,
    /// The run finished with these required keys still unset.
    Incomplete {
        /// Keys still absent or empty in `.env`.
        remaining: Vec<String>,
    },
    /// The user chose to edit `.env` by hand.
    ManualEdit {
        /// The file to edit.
        env_path: PathBuf,
    },
    /// The user aborted a prompt; the in-flight key was not written.
    Cancelled,
    /// Setup could not proceed; the user should configure `.env` by hand.
    Fallback {
        /// What went wrong.
        reason: String,
    },
}

/// Where a copied env file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The remembered path from an earlier run.
    Remembered,
    /// A path the user typed in.
    Existing,
    /// The bundle-specific env file inside the project.
    Bundle,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// Nothing is missing.
    Resolved,
    /// A fill pass ran to completion; some keys may remain by choice.
    FillPassComplete,
    /// The user took over with an editor.
    ManualEdit,
}

/// One state of the reconciliation machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Re-read `.env` and recompute the missing keys.
    CheckMissing,
    /// Look up the remembered source path.
    TryRemembered,
    /// Ask the user where values should come from.
    SourceMenu,
    /// Ask the user for a path to an existing env file.
    AskExistingPath,
    /// Overwrite `.env` with a source file.
    Copy {
        /// Origin of the source.
        kind: SourceKind,
        /// File or directory to copy from.
        path: PathBuf,
    },
    /// Prompt per service and key from the catalog.
    AutoFill,
    /// Write non-optional catalog defaults without prompting.
    ApplyDefaults,
    /// Hand `.env` to an editor.
    ManualEdit,
    /// Stop.
    Finished(Finish),
}

/// An entry of the source menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    /// Copy from the remembered path.
    Remembered(PathBuf),
    /// Copy from the bundle-specific file.
    Bundle(PathBuf),
    /// Prompt for each missing key.
    AutoFill,
    /// Open the file in an editor.
    Manual,
    /// Ask for a path and copy from it.
    Existing,
}

impl MenuItem {
    /// Menu label.
    pub fn label(&self) -> String {
        match self {
            Self::Remembered(path) => {
                format!("Copy data from recently provided .env file ({})", path.display())
            }
            Self::Bundle(path) => format!("Get keys from {}", path.display()),
            Self::AutoFill => "Yes, please help me".to_string(),
            Self::Manual => "No, I want to do it manually".to_string(),
            Self::Existing => "I have an existing .env file I can provide".to_string(),
        }
    }
}

/// Progress of one run, independent of any I/O.
#[derive(Debug, Clone, Default)]
pub struct ReconcileState {
    remaining: Vec<String>,
    written: HashSet<String>,
    tried_sources: HashSet<PathBuf>,
    remembered: Option<PathBuf>,
    remembered_checked: bool,
}

impl ReconcileState {
    /// A fresh state with nothing checked yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the remaining set with `missing`, minus keys already written
    /// in this run.
    pub fn refresh(&mut self, missing: Vec<String>) {
        self.remaining = missing
            .into_iter()
            .filter(|k| !self.written.contains(k))
            .collect();
    }

    /// Keys still to resolve.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// `true` once nothing remains.
    pub fn is_resolved(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Records that `key` was written, removing it from the remaining set.
    pub fn record_written(&mut self, key: &str) {
        self.written.insert(key.to_string());
        self.remaining.retain(|k| k != key);
    }

    /// `true` if `key` was written in this run.
    pub fn has_written(&self, key: &str) -> bool {
        self.written.contains(key)
    }

    /// Records that `path` was used as a copy source.
    pub fn record_source(&mut self, path: &Path) {
        self.tried_sources.insert(path.to_path_buf());
    }

    /// `true` if `path` was already used as a copy source.
    pub fn has_tried(&self, path: &Path) -> bool {
        self.tried_sources.contains(path)
    }

    /// Stores the outcome of the remembered-path lookup.
    pub fn set_remembered(&mut self, path: Option<PathBuf>) {
        self.remembered = path;
        self.remembered_checked = true;
    }

    /// The remembered path, unless it was already tried.
    pub fn untried_remembered(&self) -> Option<&Path> {
        self.remembered.as_deref().filter(|p| !self.has_tried(p))
    }

    /// Phase that follows a fresh missing-key check.
    pub fn after_check(&self, skip_prompts: bool, bundle: Option<&Path>) -> Phase {
        if self.is_resolved() {
            Phase::Finished(Finish::Resolved)
        } else if !self.remembered_checked {
            Phase::TryRemembered
        } else if skip_prompts {
            self.next_unattended(bundle)
        } else {
            Phase::SourceMenu
        }
    }

    /// Unattended order: remembered path, then bundle file, then defaults.
    pub fn next_unattended(&self, bundle: Option<&Path>) -> Phase {
        if let Some(path) = self.untried_remembered() {
            return Phase::Copy {
                kind: SourceKind::Remembered,
                path: path.to_path_buf(),
            };
        }
        if let Some(path) = bundle.filter(|p| !self.has_tried(p)) {
            return Phase::Copy {
                kind: SourceKind::Bundle,
                path: path.to_path_buf(),
            };
        }
        Phase::ApplyDefaults
    }

    /// Entries of the interactive source menu. Sources already tried are
    /// left out.
    pub fn source_menu(&self, bundle: Option<&Path>) -> Vec<MenuItem> {
        let mut items = Vec::new();
        if let Some(path) = self.untried_remembered() {
            items.push(MenuItem::Remembered(path.to_path_buf()));
        }
        items.push(MenuItem::AutoFill);
        items.push(MenuItem::Manual);
        items.push(MenuItem::Existing);
        if let Some(path) = bundle.filter(|p| !self.has_tried(p)) {
            items.push(MenuItem::Bundle(path.to_path_buf()));
        }
        items
    }
}

/// Normalises a typed value: drops a leading `KEY=`, trims, and strips one
/// layer of matching quotes.
pub fn clean_value(key: &str, raw: &str) -> String {
    let trimmed = raw.trim();
    let value = trimmed
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
        .unwrap_or(trimmed);
    strip_quotes(value.trim()).to_string()
}

/// Normalises a typed path: trims whitespace and surrounding quotes left by
/// drag-and-drop.
pub fn clean_path(raw: &str) -> PathBuf {
    PathBuf::from(strip_quotes(raw.trim()))
}

/// Runs reconciliation for one project.
pub struct Composer<P, M, F> {
    options: ComposeOptions,
    project: ProjectEnv,
    catalog: Catalog,
    prompter: P,
    memory: M,
    fetcher: F,
}

impl<P, M, F> Composer<P, M, F>
where
    P: Prompter,
    M: PathMemoryStore,
    F: ExampleFetcher,
{
    /// Wires a composer from its collaborators.
    pub fn new(options: ComposeOptions, catalog: Catalog, prompter: P, memory: M, fetcher: F) -> Self {
        let project = ProjectEnv::new(&options.project_path);
        Self {
            options,
            project,
            catalog,
            prompter,
            memory,
            fetcher,
        }
    }

    /// The path memory, e.g. to inspect it after a run.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Runs to completion. Never fails: errors become
    /// [`ComposeOutcome::Fallback`] and aborts [`ComposeOutcome::Cancelled`].
    pub fn run(&mut self) -> ComposeOutcome {
        match self.try_run() {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                info!("env setup cancelled");
                ComposeOutcome::Cancelled
            }
            Err(e) => {
                error!(error = %e, "failed to compose env file");
                ComposeOutcome::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn try_run(&mut self) -> ComposeResult<ComposeOutcome> {
        self.project
            .ensure_example_exists(self.options.fallback_example_url.as_deref(), &self.fetcher)?;
        if self.project.ensure_env_exists()? {
            debug!(".env created from .env.example provided by the template");
        }
        let required = self.project.required_keys()?;
        let bundle = self.bundle_candidate();

        let mut state = ReconcileState::new();
        let mut phase = Phase::CheckMissing;
        loop {
            debug!(?phase, "reconcile step");
            phase = match phase {
                Phase::CheckMissing => {
                    state.refresh(self.project.missing_keys(&required)?);
                    state.after_check(self.options.skip_prompts, bundle.as_deref())
                }
                Phase::TryRemembered => {
                    state.set_remembered(self.remembered_source());
                    if self.options.skip_prompts {
                        state.next_unattended(bundle.as_deref())
                    } else {
                        Phase::SourceMenu
                    }
                }
                Phase::SourceMenu => self.source_menu(&state, bundle.as_deref())?,
                Phase::AskExistingPath => self.ask_existing_path()?,
                Phase::Copy { kind, path } => self.copy(kind, &path, &mut state, bundle.as_deref()),
                Phase::AutoFill => self.auto_fill(&mut state)?,
                Phase::ApplyDefaults => self.apply_defaults(&mut state)?,
                Phase::ManualEdit => self.manual_edit(),
                Phase::Finished(finish) => return self.finish(finish, &required),
            };
        }
    }

    fn bundle_candidate(&self) -> Option<PathBuf> {
        if !self.options.bundle_mode {
            return None;
        }
        self.project
            .paths()
            .bundle_env_path(&self.options.bundle_dir)
            .filter(|p| p.is_file())
    }

    fn remembered_source(&self) -> Option<PathBuf> {
        let path = self.memory.load().into_path()?;
        let exists = if path.is_dir() {
            path.join(crate::paths::ENV_FILE).is_file()
        } else {
            path.is_file()
        };
        if !exists {
            debug!(path = %path.display(), "remembered env source no longer exists");
            return None;
        }
        Some(path)
    }

    fn source_menu(&mut self, state: &ReconcileState, bundle: Option<&Path>) -> ComposeResult<Phase> {
        let items = state.source_menu(bundle);
        let labels: Vec<String> = items.iter().map(MenuItem::label).collect();
        let picked = self.prompter.select(
            "Do you want me to help you fill in the .env file? Or, do you prefer to do it manually?",
            &labels,
        )?;
        let phase = match items.get(picked) {
            Some(MenuItem::Remembered(path)) => Phase::Copy {
                kind: SourceKind::Remembered,
                path: path.clone(),
            },
            Some(MenuItem::Bundle(path)) => Phase::Copy {
                kind: SourceKind::Bundle,
                path: path.clone(),
            },
            Some(MenuItem::Manual) => Phase::ManualEdit,
            Some(MenuItem::Existing) => Phase::AskExistingPath,
            Some(MenuItem::AutoFill) | None => Phase::AutoFill,
        };
        Ok(phase)
    }

    fn ask_existing_path(&mut self) -> ComposeResult<Phase> {
        let raw = self.prompter.input(&InputRequest {
            title: "Please provide the path to your existing .env file or directory:".to_string(),
            instruction: Some(
                "You can provide either the .env file path or the directory containing it.\nHint: drag-n-drop the file or directory into the terminal to insert the path."
                    .to_string(),
            ),
            ..InputRequest::default()
        })?;
        if raw.trim().is_empty() {
            warn!("no path provided");
            return Ok(Phase::SourceMenu);
        }
        Ok(Phase::Copy {
            kind: SourceKind::Existing,
            path: clean_path(&raw),
        })
    }

    fn copy(
        &mut self,
        kind: SourceKind,
        path: &Path,
        state: &mut ReconcileState,
        bundle: Option<&Path>,
    ) -> Phase {
        state.record_source(path);
        match self.project.copy_from(path) {
            Ok(used) => {
                info!(source = %used.display(), "environment variables copied");
                let used = std::path::absolute(&used).unwrap_or(used);
                if matches!(kind, SourceKind::Remembered | SourceKind::Existing)
                    && let Err(e) = self.memory.save(&used)
                {
                    warn!(error = %e, "failed to remember env file path");
                }
                Phase::CheckMissing
            }
            Err(e) => {
                warn!(error = %e, "could not copy env source");
                if self.options.skip_prompts {
                    state.next_unattended(bundle)
                } else {
                    Phase::SourceMenu
                }
            }
        }
    }

    fn auto_fill(&mut self, state: &mut ReconcileState) -> ComposeResult<Phase> {
        if !state.is_resolved() {
            info!(keys = %state.remaining().join(", "), "missing environment variables");
        }
        let groups = self.catalog.group_missing(state.remaining());
        if !groups.unknown.is_empty() {
            warn!(
                keys = %groups.unknown.join(", "),
                "no known service provides these keys; fill them in by hand"
            );
        }
        let services: Vec<ServiceDefinition> = groups.services.into_iter().cloned().collect();
        if services.is_empty() {
            return Ok(Phase::Finished(Finish::FillPassComplete));
        }

        let labels: Vec<String> = services.iter().map(|s| s.name.clone()).collect();
        let defaults = vec![true; labels.len()];
        let picked = self.prompter.multiselect(
            "Great! Which services do you want to configure?",
            &labels,
            &defaults,
        )?;
        for idx in picked {
            if let Some(service) = services.get(idx) {
                self.fill_service(service, state)?;
            }
        }
        Ok(Phase::Finished(Finish::FillPassComplete))
    }

    fn fill_service(&mut self, service: &ServiceDefinition, state: &mut ReconcileState) -> ComposeResult<()> {
        self.show_dashboard(service);
        for spec in &service.keys {
            if !state.remaining().contains(&spec.key) || state.has_written(&spec.key) {
                continue;
            }
            if spec.optional {
                let shown = spec
                    .default
                    .describe(self.options.mask_input)
                    .map(|d| format!(" (default: {})", d))
                    .unwrap_or_default();
                let configure = self
                    .prompter
                    .confirm(&format!("Do you want to configure {}?{}", spec.key, shown), false)?;
                if !configure {
                    if let Some(value) = spec.default.resolve() {
                        self.write_value(spec, &value, state)?;
                    }
                    continue;
                }
            }
            let value = self.prompt_value(service, spec)?;
            self.write_value(spec, &value, state)?;
        }
        Ok(())
    }

    fn prompt_value(&mut self, service: &ServiceDefinition, spec: &KeySpec) -> ComposeResult<String> {
        loop {
            let default = spec.default.resolve();
            let raw = self.prompter.input(&InputRequest {
                title: format!("Enter value for {}:", spec.key),
                default: default.clone(),
                masked: self.options.mask_input,
                instruction: spec.instruction.clone(),
                hint: service
                    .dashboard_url
                    .as_ref()
                    .map(|url| format!("Visit {} to get your key", url)),
            })?;
            let raw = match default {
                Some(default) if raw.trim().is_empty() => default,
                _ => raw,
            };
            let value = clean_value(&spec.key, &raw);
            match validate(&value, spec.key_type) {
                Ok(()) => return Ok(value),
                Err(message) => warn!("{}", message),
            }
        }
    }

    fn write_value(&self, spec: &KeySpec, value: &str, state: &mut ReconcileState) -> ComposeResult<()> {
        self.project.set_value(&spec.key, value)?;
        state.record_written(&spec.key);
        if self.options.mask_input {
            debug!(key = %spec.key, "value written");
        } else {
            debug!(key = %spec.key, value = %value, "value written");
        }
        Ok(())
    }

    fn apply_defaults(&mut self, state: &mut ReconcileState) -> ComposeResult<Phase> {
        let keys: Vec<String> = state.remaining().to_vec();
        for key in keys {
            let Some((_, spec)) = self.catalog.spec_for(&key) else {
                continue;
            };
            if spec.optional {
                continue;
            }
            if let Some(value) = spec.default.resolve() {
                let spec = spec.clone();
                self.write_value(&spec, &value, state)?;
            }
        }
        Ok(Phase::Finished(Finish::FillPassComplete))
    }

    fn manual_edit(&mut self) -> Phase {
        let env_path = self.project.env_path().to_path_buf();
        match self.options.editor.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(editor) => {
                let mut parts = editor.split_whitespace();
                let program = parts.next().unwrap_or(editor);
                match std::process::Command::new(program)
                    .args(parts)
                    .arg(&env_path)
                    .status()
                {
                    Ok(status) if status.success() => {
                        debug!(editor = %editor, "editor exited");
                    }
                    Ok(status) => {
                        warn!(editor = %editor, %status, "editor exited with non-zero status");
                    }
                    Err(e) => {
                        warn!(editor = %editor, error = %e, path = %env_path.display(),
                            "failed to launch editor; please open the file manually");
                    }
                }
            }
            None => info!(path = %env_path.display(), "open .env and fill in the missing values"),
        }
        Phase::Finished(Finish::ManualEdit)
    }

    fn show_dashboard(&self, service: &ServiceDefinition) {
        let Some(url) = service.dashboard_url.as_deref() else {
            return;
        };
        if self.options.open_browser {
            debug!(service = %service.name, "opening dashboard");
            if webbrowser::open(url).is_ok() {
                return;
            }
        }
        info!(service = %service.name, "dashboard link: {}", url);
    }

    fn finish(&self, finish: Finish, required: &[String]) -> ComposeResult<ComposeOutcome> {
        match finish {
            Finish::Resolved => {
                info!("all environment variables are set");
                Ok(ComposeOutcome::Complete)
            }
            Finish::ManualEdit => Ok(ComposeOutcome::ManualEdit {
                env_path: self.project.env_path().to_path_buf(),
            }),
            Finish::FillPassComplete => {
                let remaining = self.project.missing_keys(required)?;
                if remaining.is_empty() {
                    info!("all environment variables are set");
                    Ok(ComposeOutcome::Complete)
                } else {
                    info!(keys = %remaining.join(", "), "some keys are still unset");
                    Ok(ComposeOutcome::Incomplete { remaining })
                }
            }
        }
    }
}
