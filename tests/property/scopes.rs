// Property tests for lexical scoping:
// 1. A guard always restores the depth it found
// 2. Declarations never leak out of the frame they were made in
// 3. Same-frame redeclaration is reported; nested shadowing is not
// 4. Suggestions are always within edit distance 2

use kestrel::span::Span;
use kestrel::typeck::env::{closest_name, ScopeStack, Symbol, SymbolKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Enter(Vec<Step>),
    Declare(String),
}

fn arb_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "item", "items", "count"]).prop_map(str::to_string)
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    let leaf = arb_name().prop_map(Step::Declare);
    let step = leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            arb_name().prop_map(Step::Declare),
            prop::collection::vec(inner, 0..6).prop_map(Step::Enter),
        ]
    });
    prop::collection::vec(step, 0..10)
}

/// Replays `steps`, returning how many same-frame redeclarations were reported.
fn replay(scopes: &mut ScopeStack, steps: &[Step], declared_here: &mut Vec<String>) -> usize {
    let mut reported = 0;
    for step in steps {
        match step {
            Step::Declare(name) => {
                let previous = scopes.declare(Symbol::new(name.as_str(), SymbolKind::Variable, Span::dummy()));
                if declared_here.contains(name) {
                    assert!(previous.is_some(), "redeclaring '{name}' in one frame must be reported");
                    reported += 1;
                } else {
                    assert!(previous.is_none(), "'{name}' in a fresh frame must not be reported");
                    declared_here.push(name.clone());
                }
                assert!(scopes.lookup(name).is_some());
            }
            Step::Enter(inner) => {
                let depth = scopes.depth();
                {
                    let mut guard = scopes.enter();
                    let mut inner_names = Vec::new();
                    reported += replay(&mut guard, inner, &mut inner_names);
                }
                assert_eq!(scopes.depth(), depth);
            }
        }
    }
    reported
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn nested_frames_restore_and_do_not_leak(steps in arb_steps()) {
        let mut scopes = ScopeStack::new();
        scopes.push();
        let mut outer = Vec::new();
        replay(&mut scopes, &steps, &mut outer);

        prop_assert_eq!(scopes.depth(), 1);
        let mut visible: Vec<&str> = scopes.visible_names().collect();
        visible.sort();
        let mut expected: Vec<&str> = outer.iter().map(String::as_str).collect();
        expected.sort();
        prop_assert_eq!(visible, expected);
    }

    #[test]
    fn suggestions_are_close_and_never_the_name_itself(
        name in "[a-z]{1,8}",
        candidates in prop::collection::vec("[a-z]{1,8}", 0..12),
    ) {
        if let Some(found) = closest_name(&name, candidates.iter().map(String::as_str)) {
            prop_assert_ne!(found, name.as_str());
            prop_assert!(candidates.iter().any(|c| c == found));
            prop_assert!(distance(&name, found) <= 2);
        }
    }
}

fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        table[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            table[i][j] = (table[i - 1][j] + 1).min(table[i][j - 1] + 1).min(table[i - 1][j - 1] + cost);
        }
    }
    table[a.len()][b.len()]
}
