use mobilecoder_common::types::User;
use mobilecoder_session::local_fs::LocalFs;
use mobilecoder_session::prompt::ScriptedPrompter;
use mobilecoder_session::remote::RemoteStore;
use mobilecoder_session::store::{MemoryAuth, MemoryStore, StoreOp};
use mobilecoder_session::{Session, SessionState};
use proptest::prelude::*;

const WORKSPACE_NAMES: &[&str] = &["Notes", "notes", "NOTES", "src", "Ünïcode", "work"];
const FILE_NAMES: &[&str] = &["a.txt", "A.TXT", "b.rs", "README", ".env", "c.tar.gz"];

#[derive(Debug, Clone)]
enum Step {
    CreateWorkspace(usize),
    DeleteWorkspace(usize),
    UseWorkspace(usize),
    Leave,
    AddFile(usize),
    OverwriteFile(usize),
    DeleteFile(usize),
    Refresh,
    /// Arm a single failure for the next call of this kind.
    Fail(StoreOp),
}

fn step() -> impl Strategy<Value = Step> {
    let ws = 0..WORKSPACE_NAMES.len();
    let file = 0..FILE_NAMES.len();
    prop_oneof![
        3 => ws.clone().prop_map(Step::CreateWorkspace),
        1 => ws.clone().prop_map(Step::DeleteWorkspace),
        3 => ws.prop_map(Step::UseWorkspace),
        1 => Just(Step::Leave),
        4 => file.clone().prop_map(Step::AddFile),
        2 => file.clone().prop_map(Step::OverwriteFile),
        2 => file.prop_map(Step::DeleteFile),
        1 => Just(Step::Refresh),
        1 => prop_oneof![
            Just(StoreOp::CreateWorkspace),
            Just(StoreOp::DeleteWorkspace),
            Just(StoreOp::CreateFile),
            Just(StoreOp::DeleteFile),
        ]
        .prop_map(Step::Fail),
    ]
}

fn input_for(step: &Step) -> Option<String> {
    Some(match step {
        Step::CreateWorkspace(i) => format!("create workspace {}", WORKSPACE_NAMES[*i]),
        Step::DeleteWorkspace(i) => format!("delete workspace {}", WORKSPACE_NAMES[*i]),
        Step::UseWorkspace(i) => format!("use workspace {}", WORKSPACE_NAMES[*i]),
        Step::Leave => "leave workspace".to_string(),
        Step::AddFile(i) => format!("add file {}", FILE_NAMES[*i]),
        Step::OverwriteFile(i) => format!("overwrite file {}", FILE_NAMES[*i]),
        Step::DeleteFile(i) => format!("delete file {}", FILE_NAMES[*i]),
        Step::Refresh => "refresh".to_string(),
        Step::Fail(_) => return None,
    })
}

/// Tree shape without contents: workspace names with their file ids.
/// File order is ignored; an overwrite keeps its local slot but the store
/// appends the replacement.
fn shape(user: &User) -> Vec<(String, Vec<String>)> {
    user.workspaces
        .iter()
        .map(|w| {
            let mut ids: Vec<String> = w.files.iter().map(|f| f.id.to_string()).collect();
            ids.sort();
            (w.name.clone(), ids)
        })
        .collect()
}

async fn run_steps(steps: Vec<Step>) -> Result<(), TestCaseError> {
    let dir = tempfile::tempdir().map_err(|e| TestCaseError::fail(e.to_string()))?;
    for name in FILE_NAMES {
        std::fs::write(dir.path().join(name), *name).map_err(|e| TestCaseError::fail(e.to_string()))?;
    }

    let store = MemoryStore::new();
    let auth = MemoryAuth::new();
    let uid = auth.register("p@q.com", "secret1");
    store.create_user(&uid, "p", "p@q.com").await.map_err(|e| TestCaseError::fail(e.to_string()))?;

    let mut session = Session::new(store.clone(), auth, LocalFs::new(dir.path()));
    let mut login = ScriptedPrompter::new(["p@q.com", "secret1"]);
    session.execute("login", &mut login).await.map_err(|e| TestCaseError::fail(e.to_string()))?;

    for step in steps {
        if let Step::Fail(op) = step {
            store.fail_next(op, 1);
            continue;
        }
        let Some(input) = input_for(&step) else { continue };
        let mut prompter = ScriptedPrompter::new(["y"; 4]);
        let _ = session.execute(&input, &mut prompter).await;

        if session.state() == SessionState::Anonymous {
            // Only a failed refresh signs out, and no GetUser failures are armed.
            return Err(TestCaseError::fail(format!("unexpected sign-out after `{input}`")));
        }

        let user = session.user().expect("signed in");
        prop_assert!(session.cache().is_consistent_with_user(user), "workspace cache drifted after `{}`", input);
        if let Some(workspace) = session.current_workspace() {
            prop_assert!(
                session.cache().is_consistent_with_workspace(workspace),
                "file cache drifted after `{}`",
                input
            );
        }

        if !session.needs_refresh() {
            let remote = store.snapshot(&uid).expect("profile exists");
            prop_assert_eq!(shape(user), shape(&remote), "tree diverged from store after `{}`", input);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn cache_and_tree_stay_in_lockstep(steps in prop::collection::vec(step(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime should build");
        runtime.block_on(run_steps(steps))?;
    }
}
