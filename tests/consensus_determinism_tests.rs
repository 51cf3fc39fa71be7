//! Two nodes given the same public history must derive identical
//! proposal states and tally outcomes; agreement comes from
//! recomputation, not coordination.

use agora::config::GovernanceConfig;
use agora::governance::{dialectic, tally};
use agora::graph::{GraphSnapshot, Origin, Term, TermGraph, TermId, TermKind, TermSet};
use agora::platform::{Comment, Discussion};

fn id(s: &str) -> TermId {
    TermId::new(s).unwrap()
}

fn main_snapshot() -> GraphSnapshot {
    let mut main = GraphSnapshot::new(3);
    main.terms
        .insert(Term::new(id("@wellbeing"), TermKind::Term, "thriving", Origin::Main))
        .unwrap();
    main
}

fn node_graph(fork_value: &str) -> TermGraph {
    // Each node has a different private fork; that difference must not
    // affect what it derives from the shared history.
    let mut fork = TermSet::new();
    fork.insert(Term::new(
        id(fork_value),
        TermKind::Principle,
        "a private value",
        Origin::Fork,
    ))
    .unwrap();
    TermGraph::new(main_snapshot(), fork)
}

fn shared_history() -> Vec<Discussion> {
    let body = "[THESIS] Add a care term.\n\n**PROPOSED DEFINITION**\n```json\n{\"identifier\": \"@care\", \"definition\": \"active concern\", \"aligns_with\": [\"@wellbeing\"]}\n```\n".to_string();
    vec![Discussion {
        id: "D_1".to_string(),
        number: 1,
        title: "Add @care".to_string(),
        author: "alice".to_string(),
        body,
        created_at: 1_000,
        comments: vec![
            Comment {
                author: "bob".to_string(),
                body: "[ANTITHESIS] too vague".to_string(),
                created_at: 1_100,
            },
            Comment {
                author: "alice".to_string(),
                body: "[SYNTHESIS] tightened\n\n**PROPOSED DEFINITION**\n```json\n{\"identifier\": \"@care\", \"definition\": \"sustained active concern\", \"aligns_with\": [\"@wellbeing\"]}\n```\n".to_string(),
                created_at: 1_200,
            },
            Comment {
                author: "bob".to_string(),
                body: "**VOTE: APPROVE**".to_string(),
                created_at: 1_300,
            },
            Comment {
                author: "carol".to_string(),
                body: "**VOTE: APPROVE**".to_string(),
                created_at: 1_400,
            },
            Comment {
                author: "dave".to_string(),
                body: "**VOTE: REJECT**".to_string(),
                created_at: 1_500,
            },
        ],
    }]
}

#[test]
fn independent_nodes_agree_on_state_and_outcome() {
    let history = shared_history();
    let config = GovernanceConfig::default();
    let now = 2_000;

    let graph_a = node_graph("@animal_welfare");
    let graph_b = node_graph("@privacy_first");

    let a = dialectic::replay_all(&history, &graph_a);
    let b = dialectic::replay_all(&history, &graph_b);
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);

    assert_eq!(a[0].state, b[0].state);
    assert_eq!(a[0].revision, b[0].revision);
    assert_eq!(a[0].votes, b[0].votes);
    assert_eq!(a[0].payload.definition, "sustained active concern");

    let result_a = tally::evaluate(&a[0], &a[0].votes, &config, now);
    let result_b = tally::evaluate(&b[0], &b[0].votes, &config, now);
    assert_eq!(result_a.outcome, result_b.outcome);
    assert_eq!(result_a.counted_votes, result_b.counted_votes);

    // And re-evaluating the unchanged history changes nothing.
    let again = tally::evaluate(&a[0], &a[0].votes, &config, now);
    assert_eq!(again.outcome, result_a.outcome);
}
