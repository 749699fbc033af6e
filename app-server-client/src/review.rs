use codex_monitor_protocol::ReviewTarget;

const REVIEW_COMMAND: &str = "/review";

/// Parse the text of a `/review` command.
///
/// `/review` alone reviews uncommitted changes; `base <branch>` and
/// `commit <sha> [title]` pick those targets; `custom <text>` and anything
/// else are treated as custom instructions.
pub fn parse_review_target(text: &str) -> ReviewTarget {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix(REVIEW_COMMAND).unwrap_or(trimmed).trim();
    if rest.is_empty() {
        return ReviewTarget::UncommittedChanges;
    }

    let (keyword, args) = match rest.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (rest, ""),
    };
    match keyword.to_ascii_lowercase().as_str() {
        "base" if !args.is_empty() => ReviewTarget::BaseBranch {
            branch: first_word(args).to_string(),
        },
        "commit" if !args.is_empty() => {
            let (sha, title) = match args.split_once(char::is_whitespace) {
                Some((sha, title)) => (sha, Some(title.trim().to_string())),
                None => (args, None),
            };
            ReviewTarget::Commit {
                sha: sha.to_string(),
                title: title.filter(|title| !title.is_empty()),
            }
        }
        "uncommitted" if args.is_empty() => ReviewTarget::UncommittedChanges,
        "custom" if !args.is_empty() => ReviewTarget::Custom {
            instructions: args.to_string(),
        },
        _ => ReviewTarget::Custom {
            instructions: rest.to_string(),
        },
    }
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or(text)
}

/// Short label shown in the synthetic "review started" item.
pub fn review_label(target: &ReviewTarget) -> String {
    match target {
        ReviewTarget::UncommittedChanges => "Reviewing uncommitted changes".to_string(),
        ReviewTarget::BaseBranch { branch } => format!("Reviewing changes against {branch}"),
        ReviewTarget::Commit { sha, title } => match title {
            Some(title) => format!("Reviewing commit {sha}: {title}"),
            None => format!("Reviewing commit {sha}"),
        },
        ReviewTarget::Custom { instructions } => format!("Reviewing: {instructions}"),
    }
}
