use std::path::Path;
use std::sync::Arc;

use agora::config::{ActionMode, NodeConfig};
use agora::decider::{NodeAction, ScriptedDecider};
use agora::governance::{ProposalPayload, TallyOutcome, VoteChoice};
use agora::graph::{Origin, Term, TermId, TermKind, TermSet};
use agora::platform::{Comment, Discussion, InMemoryPlatform};
use agora::storage::{load_main_snapshot, save_vocabulary, ReservedMeta, Storage};
use agora::utils::timestamp_secs;
use agora::GovernanceNode;

fn id(s: &str) -> TermId {
    TermId::new(s).unwrap()
}

fn seed_main(path: &Path) {
    let store = Storage::new(path).unwrap();
    let mut set = TermSet::new();
    set.insert(Term::new(id("@harm"), TermKind::Term, "damage to wellbeing", Origin::Main))
        .unwrap();
    set.insert(Term::new(
        id("@wellbeing"),
        TermKind::Term,
        "state of thriving",
        Origin::Main,
    ))
    .unwrap();
    save_vocabulary(&store, &set, &ReservedMeta::default()).unwrap();
}

fn seed_fork(path: &Path) {
    let store = Storage::new(path).unwrap();
    let mut set = TermSet::new();
    set.insert(Term::new(
        id("@my_personal_value"),
        TermKind::Principle,
        "animals deserve moral weight",
        Origin::Fork,
    ))
    .unwrap();
    save_vocabulary(&store, &set, &ReservedMeta::default()).unwrap();
}

fn config(fork: &Path, main: &Path) -> NodeConfig {
    NodeConfig {
        fork_path: fork.to_path_buf(),
        main_path: main.to_path_buf(),
        main_repo: "agora-net/vocabulary".to_string(),
        platform_token: String::new(),
        node_name: "node-a".to_string(),
        action_mode: ActionMode::Auto,
        gemini_api_key: String::new(),
        openai_api_key: String::new(),
        anthropic_api_key: String::new(),
        gemini_model: "gemini-2.0-flash-exp".to_string(),
    }
}

fn thesis_body(target: &str, aligns: &str) -> String {
    format!(
        "[THESIS] Expand the vocabulary.\n\n**PROPOSED DEFINITION**\n```json\n{{\"identifier\": \"{target}\", \"definition\": \"a proposed definition\", \"aligns_with\": [\"{aligns}\"]}}\n```\n"
    )
}

fn comment(author: &str, body: &str, created_at: u64) -> Comment {
    Comment {
        author: author.to_string(),
        body: body.to_string(),
        created_at,
    }
}

fn proposal_discussion(number: u64, target: &str, aligns: &str, comments: Vec<Comment>) -> Discussion {
    Discussion {
        id: format!("D_{number}"),
        number,
        title: format!("Add {target}"),
        author: "alice".to_string(),
        body: thesis_body(target, aligns),
        created_at: timestamp_secs() - 3_600,
        comments,
    }
}

#[tokio::test]
async fn approved_proposal_merges_and_persists() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let now = timestamp_secs();
    let discussion = proposal_discussion(
        1,
        "@care",
        "@wellbeing",
        vec![
            comment("bob", "**VOTE: APPROVE**", now - 300),
            comment("carol", "**VOTE: APPROVE**", now - 200),
            comment("dave", "**VOTE: REJECT**", now - 100),
        ],
    );

    let platform = Arc::new(InMemoryPlatform::with_discussions(vec![discussion]));
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Noop]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform, decider)
        .unwrap();

    let report = node.run_once().await.unwrap();

    assert_eq!(report.proposals_seen, 1);
    assert_eq!(
        report.outcomes,
        vec![("prop-1".to_string(), TallyOutcome::Approved)]
    );
    assert_eq!(report.merged, vec!["prop-1".to_string()]);

    // The new snapshot is persisted with the version bumped.
    let store = Storage::new(main_dir.path()).unwrap();
    let (snapshot, _) = load_main_snapshot(&store).unwrap();
    assert_eq!(snapshot.version, 2);
    let care = snapshot.terms.get(&id("@care")).unwrap();
    assert_eq!(care.definition, "a proposed definition");
}

#[tokio::test]
async fn two_votes_stay_open_under_default_quorum() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let now = timestamp_secs();
    let discussion = proposal_discussion(
        1,
        "@care",
        "@wellbeing",
        vec![
            comment("bob", "**VOTE: APPROVE**", now - 300),
            comment("carol", "**VOTE: APPROVE**", now - 200),
        ],
    );

    let platform = Arc::new(InMemoryPlatform::with_discussions(vec![discussion]));
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Noop]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform, decider)
        .unwrap();

    let report = node.run_once().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.merged.is_empty());

    let store = Storage::new(main_dir.path()).unwrap();
    let (snapshot, _) = load_main_snapshot(&store).unwrap();
    assert_eq!(snapshot.version, 1);
}

#[tokio::test]
async fn fork_only_citation_never_reaches_voting() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let now = timestamp_secs();
    // Votes arrive, but the proposal is terminally rejected before
    // thesis, so they are never counted.
    let discussion = proposal_discussion(
        1,
        "@care",
        "@my_personal_value",
        vec![
            comment("bob", "**VOTE: APPROVE**", now - 300),
            comment("carol", "**VOTE: APPROVE**", now - 200),
            comment("dave", "**VOTE: APPROVE**", now - 100),
        ],
    );

    let platform = Arc::new(InMemoryPlatform::with_discussions(vec![discussion]));
    // The decider tries to vote on the rejected thread; the core drops it.
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Vote {
        thread_id: "D_1".to_string(),
        choice: VoteChoice::Approve,
        reasoning: "looks good".to_string(),
    }]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform.clone(), decider)
        .unwrap();

    let report = node.run_once().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.merged.is_empty());
    assert_eq!(report.action, "noop");
    // Nothing was posted.
    assert!(platform.discussions()[0].comments.len() == 3);
}

#[tokio::test]
async fn vote_action_posts_a_marker_comment() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let now = timestamp_secs();
    let discussion = proposal_discussion(
        1,
        "@care",
        "@wellbeing",
        vec![comment("bob", "**VOTE: APPROVE**", now - 300)],
    );

    let platform = Arc::new(InMemoryPlatform::with_discussions(vec![discussion]));
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Vote {
        thread_id: "D_1".to_string(),
        choice: VoteChoice::Approve,
        reasoning: "aligned with my fork values".to_string(),
    }]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform.clone(), decider)
        .unwrap();

    let report = node.run_once().await.unwrap();
    assert_eq!(report.action, "vote");

    let discussions = platform.discussions();
    let posted = discussions[0].comments.last().unwrap();
    assert!(posted.body.contains("**VOTE: APPROVE**"));
    assert!(posted.body.contains("MY FORK VALUES"));
}

#[tokio::test]
async fn propose_action_opens_a_thesis_thread() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let payload = ProposalPayload {
        identifier: id("@care"),
        definition: "active concern for others".to_string(),
        aligns_with: vec![id("@wellbeing")],
        kind: TermKind::Principle,
    };

    let platform = Arc::new(InMemoryPlatform::new());
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Propose {
        title: "Add @care".to_string(),
        payload,
        rationale: "care grounds cooperation".to_string(),
    }]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform.clone(), decider)
        .unwrap();

    let report = node.run_once().await.unwrap();
    assert_eq!(report.action, "propose");

    let discussions = platform.discussions();
    assert_eq!(discussions.len(), 1);
    assert!(discussions[0].body.contains("[THESIS]"));
    assert!(discussions[0].body.contains("**PROPOSED DEFINITION**"));
    assert!(discussions[0].body.contains("@care"));
}

#[tokio::test]
async fn propose_citing_fork_value_is_dropped() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let payload = ProposalPayload {
        identifier: id("@care"),
        definition: "active concern".to_string(),
        aligns_with: vec![id("@my_personal_value")],
        kind: TermKind::Term,
    };

    let platform = Arc::new(InMemoryPlatform::new());
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Propose {
        title: "Add @care".to_string(),
        payload,
        rationale: "motivated by my fork".to_string(),
    }]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform.clone(), decider)
        .unwrap();

    let report = node.run_once().await.unwrap();
    assert_eq!(report.action, "noop");
    assert!(platform.discussions().is_empty());
}

#[tokio::test]
async fn action_mode_restricts_emitted_kinds() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let payload = ProposalPayload {
        identifier: id("@care"),
        definition: "active concern".to_string(),
        aligns_with: vec![id("@wellbeing")],
        kind: TermKind::Term,
    };

    let mut cfg = config(fork_dir.path(), main_dir.path());
    cfg.action_mode = ActionMode::VoteOnly;

    let platform = Arc::new(InMemoryPlatform::new());
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Propose {
        title: "Add @care".to_string(),
        payload,
        rationale: "out of mode".to_string(),
    }]));
    let node = GovernanceNode::new(&cfg, platform.clone(), decider).unwrap();

    let report = node.run_once().await.unwrap();
    assert_eq!(report.action, "noop");
    assert!(platform.discussions().is_empty());
}

#[tokio::test]
async fn second_approval_in_one_pass_waits_for_revalidation() {
    let fork_dir = tempfile::tempdir().unwrap();
    let main_dir = tempfile::tempdir().unwrap();
    seed_main(main_dir.path());
    seed_fork(fork_dir.path());

    let now = timestamp_secs();
    let approvals = |base: u64| {
        vec![
            comment("bob", "**VOTE: APPROVE**", base),
            comment("carol", "**VOTE: APPROVE**", base + 10),
            comment("dave", "**VOTE: APPROVE**", base + 20),
        ]
    };
    let first = proposal_discussion(1, "@care", "@wellbeing", approvals(now - 500));
    let second = proposal_discussion(2, "@respect", "@wellbeing", approvals(now - 400));

    let platform = Arc::new(InMemoryPlatform::with_discussions(vec![first, second]));
    let decider = Arc::new(ScriptedDecider::new([NodeAction::Noop]));
    let node = GovernanceNode::new(&config(fork_dir.path(), main_dir.path()), platform, decider)
        .unwrap();

    let report = node.run_once().await.unwrap();

    // Both tallies decide, but only the first merge applies; the second
    // was validated against the pre-merge snapshot and must re-validate.
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.merged, vec!["prop-1".to_string()]);

    let store = Storage::new(main_dir.path()).unwrap();
    let (snapshot, _) = load_main_snapshot(&store).unwrap();
    assert_eq!(snapshot.version, 2);
    assert!(snapshot.terms.contains(&id("@care")));
    assert!(!snapshot.terms.contains(&id("@respect")));
}
