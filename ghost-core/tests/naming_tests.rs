//! Container naming: determinism, injectivity and namespace membership.

use std::collections::HashMap;

use ghost_core::{types::is_managed, ContainerName, ProjectName, NAMESPACE_PREFIX};
use rstest::rstest;

fn name_of(s: &str) -> ContainerName {
    ContainerName::for_project(&ProjectName::new(s).expect("valid project"))
}

// ---------------------------------------------------------------------------
// 1. Known mappings
// ---------------------------------------------------------------------------

#[rstest]
#[case("demo-site", "ghost_demo_site")]
#[case("portfolio", "ghost_portfolio")]
#[case("a-b-c-1", "ghost_a_b_c_1")]
#[case("example.com", "ghost_example_com.6578616d706c652e636f6d")]
#[case("Blog", "ghost_blog.426c6f67")]
#[case("my_app", "ghost_my_app.6d795f617070")]
fn known_container_names(#[case] project: &str, #[case] expected: &str) {
    assert_eq!(name_of(project).as_str(), expected);
}

#[test]
fn derivation_is_deterministic() {
    for p in ["demo-site", "Demo.Site", "x_y-z"] {
        assert_eq!(name_of(p), name_of(p));
    }
}

// ---------------------------------------------------------------------------
// 2. Injectivity
// ---------------------------------------------------------------------------

/// Every name over a small alphabet up to length 3; two names mapping to the
/// same container must be the same project.
#[test]
fn exhaustive_small_alphabet_has_no_collisions() {
    let alphabet = ['a', 'A', '1', '-', '.', '_'];
    let mut seen: HashMap<ContainerName, String> = HashMap::new();

    let mut candidates = Vec::new();
    for a in alphabet {
        candidates.push(a.to_string());
        for b in alphabet {
            candidates.push(format!("{a}{b}"));
            for c in alphabet {
                candidates.push(format!("{a}{b}{c}"));
            }
        }
    }

    for candidate in candidates {
        let Ok(project) = ProjectName::new(candidate.clone()) else {
            continue;
        };
        let container = ContainerName::for_project(&project);
        if let Some(previous) = seen.insert(container.clone(), candidate.clone()) {
            panic!("{previous:?} and {candidate:?} both map to {container}");
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Namespace
// ---------------------------------------------------------------------------

#[test]
fn every_derived_name_is_managed() {
    for p in ["demo-site", "UPPER", "dots.and_underscores"] {
        let name = name_of(p);
        assert!(name.as_str().starts_with(NAMESPACE_PREFIX));
        assert!(name.is_managed());
    }
}

#[test]
fn foreign_containers_are_not_managed() {
    assert!(!is_managed("postgres"));
    assert!(!is_managed("my_ghost_app"));
    assert!(!ContainerName::from_engine("redis_1").is_managed());
}
