use std::collections::VecDeque;
use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use envcompose::memory::{
    MemoryStore,
    PathMemoryStore,
    RememberedPath,
};
use envcompose::prompt::InputRequest;
use envcompose::{
    Catalog,
    ComposeError,
    ComposeOptions,
    ComposeOutcome,
    ComposeResult,
    Composer,
    DefaultValue,
    EncryptedPathMemory,
    ExampleFetcher,
    KeySpec,
    KeyType,
    Prompter,
    SecretManager,
    ServiceDefinition,
};
use serial_test::serial;

#[derive(Debug)]
enum Answer {
    Select(usize),
    Multi(Vec<usize>),
    Input(&'static str),
    Confirm(bool),
    Cancel,
}

/// Replays a fixed list of answers and records what was asked.
#[derive(Default)]
struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    menus: Vec<Vec<String>>,
    inputs: Vec<String>,
}

impl ScriptedPrompter {
    fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: answers.into(),
            ..Self::default()
        }
    }

    fn next(&mut self, asked: &str) -> Answer {
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {}", asked))
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, title: &str, items: &[String]) -> ComposeResult<usize> {
        self.menus.push(items.to_vec());
        match self.next(title) {
            Answer::Select(i) => Ok(i),
            Answer::Cancel => Err(ComposeError::Cancelled),
            other => panic!("select {:?} answered with {:?}", title, other),
        }
    }

    fn multiselect(
        &mut self,
        title: &str,
        _items: &[String],
        defaults: &[bool],
    ) -> ComposeResult<Vec<usize>> {
        assert!(defaults.iter().all(|d| *d), "services should start selected");
        match self.next(title) {
            Answer::Multi(picked) => Ok(picked),
            Answer::Cancel => Err(ComposeError::Cancelled),
            other => panic!("multiselect {:?} answered with {:?}", title, other),
        }
    }

    fn input(&mut self, request: &InputRequest) -> ComposeResult<String> {
        self.inputs.push(request.title.clone());
        match self.next(&request.title) {
            Answer::Input(value) => Ok(value.to_string()),
            Answer::Cancel => Err(ComposeError::Cancelled),
            other => panic!("input {:?} answered with {:?}", request.title, other),
        }
    }

    fn confirm(&mut self, title: &str, _default: bool) -> ComposeResult<bool> {
        match self.next(title) {
            Answer::Confirm(yes) => Ok(yes),
            Answer::Cancel => Err(ComposeError::Cancelled),
            other => panic!("confirm {:?} answered with {:?}", title, other),
        }
    }
}

struct StubFetcher(Result<&'static str, &'static str>);

impl ExampleFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> ComposeResult<String> {
        self.0
            .map(str::to_string)
            .map_err(|reason| ComposeError::FetchFailed {
                url: url.to_string(),
                reason: reason.to_string(),
            })
    }
}

const NO_FETCH: StubFetcher = StubFetcher(Err("network disabled in tests"));

fn memory() -> EncryptedPathMemory<MemoryStore, SecretManager> {
    EncryptedPathMemory::new(MemoryStore::new(), SecretManager::generate())
}

fn project(root: &Path, example: &str) -> PathBuf {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join(".env.example"), example).unwrap();
    root.to_path_buf()
}

fn read_env(root: &Path) -> String {
    fs::read_to_string(root.join(".env")).unwrap()
}

/// Switches the working directory for one test and restores it on drop.
struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

fn unattended(root: &Path) -> ComposeOptions {
    let mut options = ComposeOptions::new(root);
    options.skip_prompts = true;
    options
}

#[test]
fn unattended_fresh_project_applies_required_defaults_only() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(
        &tmp.path().join("app"),
        "# Database\nDATABASE_URL=\nPORT=\nDEBUG=\nBETTER_AUTH_SECRET=\n",
    );
    let mut prompter = ScriptedPrompter::default();
    let mut memory = memory();

    let outcome = Composer::new(
        unattended(&root),
        Catalog::builtin(),
        &mut prompter,
        &mut memory,
        NO_FETCH,
    )
    .run();

    assert_eq!(
        outcome,
        ComposeOutcome::Incomplete {
            remaining: vec!["DATABASE_URL".to_string(), "BETTER_AUTH_SECRET".to_string()],
        }
    );
    assert_eq!(
        read_env(&root),
        "# Database\nDATABASE_URL=\nPORT=\"3000\"\nDEBUG=\"false\"\nBETTER_AUTH_SECRET=\n"
    );
    assert!(prompter.menus.is_empty() && prompter.inputs.is_empty());
}

#[test]
fn already_complete_env_is_left_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "DATABASE_URL=\n");
    fs::write(root.join(".env"), "# mine\nDATABASE_URL=postgres://db\r\n").unwrap();

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        ScriptedPrompter::default(),
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&root), "# mine\nDATABASE_URL=postgres://db\r\n");
}

#[test]
fn existing_path_is_remembered_and_reused_unattended() {
    let tmp = tempfile::tempdir().unwrap();
    let other = tmp.path().join("other");
    fs::create_dir_all(&other).unwrap();
    let source = "DATABASE_URL=postgres://shared\nRESEND_API_KEY=re_123\n";
    fs::write(other.join(".env"), source).unwrap();
    let mut memory = memory();

    // Run 1: point at the directory, quoted the way a drag-and-drop pastes it.
    let first = project(&tmp.path().join("first"), "DATABASE_URL=\nRESEND_API_KEY=\n");
    let typed: &'static str = Box::leak(format!("  '{}'  ", other.display()).into_boxed_str());
    let mut prompter = ScriptedPrompter::new(vec![Answer::Select(2), Answer::Input(typed)]);
    let outcome = Composer::new(
        ComposeOptions::new(&first),
        Catalog::builtin(),
        &mut prompter,
        &mut memory,
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&first), source);
    assert_eq!(
        prompter.menus[0],
        vec![
            "Yes, please help me".to_string(),
            "No, I want to do it manually".to_string(),
            "I have an existing .env file I can provide".to_string(),
        ]
    );
    let remembered = memory.load().into_path().unwrap();
    assert!(remembered.is_absolute());
    assert_eq!(remembered, other.join(".env"));

    // Run 2: a different project picks it up without asking.
    let second = project(&tmp.path().join("second"), "DATABASE_URL=\n");
    let outcome = Composer::new(
        unattended(&second),
        Catalog::builtin(),
        ScriptedPrompter::default(),
        &mut memory,
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&second), source);
}

#[test]
fn remembered_path_is_offered_first_in_the_menu() {
    let tmp = tempfile::tempdir().unwrap();
    let other = tmp.path().join("other.env");
    fs::write(&other, "DATABASE_URL=postgres://shared\n").unwrap();
    let mut memory = memory();
    memory.save(&other).unwrap();

    let root = project(&tmp.path().join("app"), "DATABASE_URL=\n");
    let mut prompter = ScriptedPrompter::new(vec![Answer::Select(0)]);
    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        &mut memory,
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(prompter.menus.len(), 1);
    assert!(prompter.menus[0][0].starts_with("Copy data from recently provided .env file"));
    assert_eq!(read_env(&root), "DATABASE_URL=postgres://shared\n");
}

#[test]
fn undecryptable_memory_is_treated_as_not_set() {
    let tmp = tempfile::tempdir().unwrap();
    let other = tmp.path().join("other.env");
    fs::write(&other, "DATABASE_URL=postgres://shared\n").unwrap();

    let mut written = memory();
    written.save(&other).unwrap();
    let mut rekeyed = EncryptedPathMemory::new(written.into_store(), SecretManager::generate());
    assert!(matches!(rekeyed.load(), RememberedPath::Unavailable(_)));

    let root = project(&tmp.path().join("app"), "DATABASE_URL=\nPORT=\n");
    let outcome = Composer::new(
        unattended(&root),
        Catalog::builtin(),
        ScriptedPrompter::default(),
        &mut rekeyed,
        NO_FETCH,
    )
    .run();

    assert_eq!(
        outcome,
        ComposeOutcome::Incomplete {
            remaining: vec!["DATABASE_URL".to_string()],
        }
    );
    assert_eq!(read_env(&root), "DATABASE_URL=\nPORT=\"3000\"\n");
}

#[test]
fn bundle_file_resolves_unattended_without_being_remembered() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("shop"), "DATABASE_URL=\nSTRIPE_SECRET_KEY=\n");
    let bundle_dir = root.join(".config").join("mrse");
    fs::create_dir_all(&bundle_dir).unwrap();
    fs::write(
        bundle_dir.join("shop.env"),
        "DATABASE_URL=postgres://bundle\nSTRIPE_SECRET_KEY=sk_test_1\n",
    )
    .unwrap();

    let mut options = unattended(&root);
    options.bundle_mode = true;
    let mut memory = memory();
    let outcome = Composer::new(
        options,
        Catalog::builtin(),
        ScriptedPrompter::default(),
        &mut memory,
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert!(read_env(&root).contains("STRIPE_SECRET_KEY=sk_test_1"));
    assert_eq!(memory.load(), RememberedPath::NotSet);
}

#[test]
fn auto_fill_reprompts_until_valid_and_uses_defaults_on_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "PORT=\nDEBUG=\n");
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(0),
        Answer::Multi(vec![0]),
        Answer::Input("abc"),
        Answer::Input("PORT=\"8080\""),
        Answer::Input(""),
    ]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&root), "PORT=\"8080\"\nDEBUG=\"false\"\n");
    assert_eq!(
        prompter.inputs,
        vec![
            "Enter value for PORT:".to_string(),
            "Enter value for PORT:".to_string(),
            "Enter value for DEBUG:".to_string(),
        ]
    );
}

#[test]
fn declined_optional_key_gets_its_generated_default() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "BETTER_AUTH_SECRET=\n");
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(0),
        Answer::Multi(vec![0]),
        Answer::Confirm(false),
    ]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    let env = read_env(&root);
    let value = env
        .trim_end()
        .strip_prefix("BETTER_AUTH_SECRET=\"")
        .and_then(|v| v.strip_suffix('"'))
        .unwrap();
    assert_eq!(value.len(), 64);
    assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn unknown_keys_are_left_for_the_user() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "SOMETHING_CUSTOM=\n");
    let mut prompter = ScriptedPrompter::new(vec![Answer::Select(0)]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(
        outcome,
        ComposeOutcome::Incomplete {
            remaining: vec!["SOMETHING_CUSTOM".to_string()],
        }
    );
}

#[test]
fn cancelling_mid_fill_leaves_the_key_unwritten() {
    let tmp = tempfile::tempdir().unwrap();
    let example = "DATABASE_URL=\nGITHUB_CLIENT_ID=\n";
    let root = project(&tmp.path().join("app"), example);
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(0),
        Answer::Multi(vec![0, 1]),
        Answer::Cancel,
    ]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Cancelled);
    assert_eq!(read_env(&root), example);
}

#[test]
fn partial_copy_returns_to_the_menu() {
    let tmp = tempfile::tempdir().unwrap();
    let partial = tmp.path().join("partial.env");
    fs::write(&partial, "DATABASE_URL=postgres://x\n").unwrap();
    let typed: &'static str = Box::leak(partial.display().to_string().into_boxed_str());
    let root = project(&tmp.path().join("app"), "DATABASE_URL=\nCUSTOM_TOKEN=\n");
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(2),
        Answer::Input(typed),
        Answer::Select(1),
    ]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(
        outcome,
        ComposeOutcome::ManualEdit {
            env_path: root.join(".env"),
        }
    );
    assert_eq!(prompter.menus.len(), 2);
    assert_eq!(read_env(&root), "DATABASE_URL=postgres://x\n");
}

#[test]
fn missing_source_file_returns_to_the_menu() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "CUSTOM_TOKEN=\n");
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(2),
        Answer::Input("/definitely/not/here/.env"),
        Answer::Select(1),
    ]);

    let outcome = Composer::new(
        ComposeOptions::new(&root),
        Catalog::builtin(),
        &mut prompter,
        memory(),
        NO_FETCH,
    )
    .run();

    assert!(matches!(outcome, ComposeOutcome::ManualEdit { .. }));
    assert_eq!(read_env(&root), "CUSTOM_TOKEN=\n");
}

#[test]
fn missing_example_is_fetched_from_the_fallback_url() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("app");
    fs::create_dir_all(&root).unwrap();
    let mut options = unattended(&root);
    options.fallback_example_url = Some("https://example.test/.env.example".to_string());

    let outcome = Composer::new(
        options,
        Catalog::builtin(),
        ScriptedPrompter::default(),
        memory(),
        StubFetcher(Ok("PORT=\n")),
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(fs::read_to_string(root.join(".env.example")).unwrap(), "PORT=\n");
    assert_eq!(read_env(&root), "PORT=\"3000\"\n");
}

#[test]
fn failed_fetch_falls_back_to_manual_instructions() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("app");
    fs::create_dir_all(&root).unwrap();
    let mut options = unattended(&root);
    options.fallback_example_url = Some("https://example.test/.env.example".to_string());

    let outcome = Composer::new(
        options,
        Catalog::builtin(),
        ScriptedPrompter::default(),
        memory(),
        StubFetcher(Err("HTTP 404 Not Found")),
    )
    .run();

    match outcome {
        ComposeOutcome::Fallback { reason } => assert!(reason.contains("404")),
        other => panic!("expected fallback, got {:?}", other),
    }
    assert!(!root.join(".env").exists());
}

#[test]
fn missing_example_without_url_falls_back() {
    let tmp = tempfile::tempdir().unwrap();
    let outcome = Composer::new(
        unattended(tmp.path()),
        Catalog::builtin(),
        ScriptedPrompter::default(),
        memory(),
        NO_FETCH,
    )
    .run();

    assert!(matches!(outcome, ComposeOutcome::Fallback { .. }));
}

#[test]
#[serial]
fn typed_relative_path_is_remembered_as_absolute() {
    let tmp = tempfile::tempdir().unwrap();
    let _cwd = CwdGuard::enter(tmp.path());
    let cwd = std::env::current_dir().unwrap();
    fs::create_dir_all("other").unwrap();
    fs::write("other/.env", "DATABASE_URL=postgres://shared\n").unwrap();
    let first = project(&cwd.join("first"), "DATABASE_URL=\n");

    let mut composer = Composer::new(
        ComposeOptions::new(&first),
        Catalog::builtin(),
        ScriptedPrompter::new(vec![Answer::Select(2), Answer::Input("other")]),
        memory(),
        NO_FETCH,
    );
    assert_eq!(composer.run(), ComposeOutcome::Complete);
    let remembered = composer.memory().load().into_path().unwrap();
    assert_eq!(remembered, cwd.join("other").join(".env"));

    // The record still resolves from another working directory.
    let elsewhere = cwd.join("elsewhere");
    fs::create_dir_all(&elsewhere).unwrap();
    std::env::set_current_dir(&elsewhere).unwrap();
    let mut memory = memory();
    memory.save(&remembered).unwrap();
    let second = project(&cwd.join("second"), "DATABASE_URL=\n");
    let outcome = Composer::new(
        unattended(&second),
        Catalog::builtin(),
        ScriptedPrompter::default(),
        &mut memory,
        NO_FETCH,
    )
    .run();
    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&second), "DATABASE_URL=postgres://shared\n");
}

#[test]
#[serial]
fn bundle_file_is_found_when_run_from_inside_the_project() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("shop"), "DATABASE_URL=\n");
    fs::create_dir_all(root.join(".config/mrse")).unwrap();
    fs::write(root.join(".config/mrse/shop.env"), "DATABASE_URL=postgres://bundle\n").unwrap();
    let _cwd = CwdGuard::enter(&root);

    let mut options = unattended(Path::new("."));
    options.bundle_mode = true;
    let outcome = Composer::new(
        options,
        Catalog::builtin(),
        ScriptedPrompter::default(),
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(outcome, ComposeOutcome::Complete);
    assert_eq!(read_env(&root), "DATABASE_URL=postgres://bundle\n");
}

#[test]
fn unattended_run_generates_required_secrets() {
    let tmp = tempfile::tempdir().unwrap();
    let root = project(&tmp.path().join("app"), "DATABASE_URL=\nAPI_KEY=\n");
    let catalog = Catalog::new(vec![
        ServiceDefinition::new("api", "API").key(
            KeySpec::new("API_KEY", KeyType::Password).with_default(DefaultValue::generated()),
        ),
    ])
    .unwrap();

    let outcome = Composer::new(
        unattended(&root),
        catalog,
        ScriptedPrompter::default(),
        memory(),
        NO_FETCH,
    )
    .run();

    assert_eq!(
        outcome,
        ComposeOutcome::Incomplete {
            remaining: vec!["DATABASE_URL".to_string()],
        }
    );
    let env = read_env(&root);
    let lines: Vec<&str> = env.lines().collect();
    assert_eq!(lines[0], "DATABASE_URL=");
    let secret = lines[1]
        .strip_prefix("API_KEY=\"")
        .and_then(|v| v.strip_suffix('"'))
        .unwrap();
    assert!(regex::Regex::new("^[0-9a-f]{64}$").unwrap().is_match(secret));
}
