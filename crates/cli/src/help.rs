// Command reference shown by `help` and `help -a`.

use mobilecoder_session::SessionState;

const ANONYMOUS: &[(&str, &str)] = &[
    ("signup", "Create a new profile."),
    ("login", "Log in to an existing profile."),
];

const AUTHENTICATED: &[(&str, &str)] = &[
    ("show workspaces", "List the workspaces of the current user."),
    ("create workspace <name>", "Create a workspace (at most 50 characters)."),
    ("use workspace <name>", "Enter a workspace. Names match regardless of case."),
    ("delete workspace <name>", "Delete a workspace and every file inside it."),
    ("refresh", "Reload all data, e.g. after changes made from another device."),
    ("signout", "Sign out of the current profile."),
];

const IN_WORKSPACE: &[(&str, &str)] = &[
    ("show files", "List the files in the current workspace."),
    ("view file <name>", "Show a stored file's contents, then offer to pull it."),
    ("add file <path>", "Upload a local file. Include the extension."),
    ("pull file <name|-a>", "Write a stored file into the working directory; -a pulls all."),
    ("delete file <name>", "Delete a stored file."),
    ("overwrite file <name>", "Replace a stored file with the local version."),
    ("refresh", "Reload all data, e.g. after changes made from another device."),
    ("leave workspace", "Leave the current workspace."),
];

const GLOBAL: &[(&str, &str)] = &[
    ("ls [path]", "List a local directory, the working directory by default."),
    ("clear", "Clear the screen."),
    ("quit", "Exit the program."),
    ("help [-a]", "List the commands available now; -a lists every command."),
];

const ALL_STATES: [SessionState; 3] =
    [SessionState::Anonymous, SessionState::Authenticated, SessionState::InWorkspace];

fn section(title: &str, commands: &[(&str, &str)]) -> String {
    let width = commands.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
    let mut out = format!("{title}\n");
    for (usage, summary) in commands {
        out.push_str(&format!("  {usage:<width$}  {summary}\n"));
    }
    out
}

fn commands_for(state: SessionState) -> (&'static str, &'static [(&'static str, &'static str)]) {
    match state {
        SessionState::Anonymous => ("Signed out", ANONYMOUS),
        SessionState::Authenticated => ("Signed in", AUTHENTICATED),
        SessionState::InWorkspace => ("In a workspace", IN_WORKSPACE),
    }
}

/// Help text for `state`, or for every state when `all` is set.
pub fn render(state: SessionState, all: bool) -> String {
    let current = [state];
    let states: &[SessionState] = if all { &ALL_STATES } else { &current };

    let mut sections: Vec<String> = states
        .iter()
        .map(|state| {
            let (title, commands) = commands_for(*state);
            section(title, commands)
        })
        .collect();
    sections.push(section("Always available", GLOBAL));
    sections.join("\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shows_only_current_state_and_globals() {
        let text = render(SessionState::Authenticated, false);
        assert!(text.contains("create workspace <name>"));
        assert!(text.contains("quit"));
        assert!(!text.contains("signup"));
        assert!(!text.contains("add file"));
    }

    #[test]
    fn all_flag_lists_every_group() {
        let text = render(SessionState::Anonymous, true);
        for heading in ["Signed out", "Signed in", "In a workspace", "Always available"] {
            assert!(text.contains(heading), "missing heading {heading}");
        }
        assert!(text.contains("overwrite file <name>"));
    }

    #[test]
    fn usage_column_is_aligned() {
        let text = render(SessionState::InWorkspace, false);
        let column = |needle: &str| {
            let line = text.lines().find(|l| l.contains(needle)).unwrap();
            line.find(" Show").or_else(|| line.find(" List")).unwrap()
        };
        assert_eq!(column("view file"), column("show files"));
    }
}
