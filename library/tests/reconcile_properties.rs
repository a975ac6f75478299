//! Behavioural checks for root directory reconciliation across many inputs.

use medley_library::{ChangeRequest, RootDirectory, RootDirectorySet, reconcile};
use pretty_assertions::assert_eq;

fn set(raw: &[&str]) -> RootDirectorySet {
    RootDirectorySet::from_dirs(raw.iter().filter_map(|r| RootDirectory::parse(r)))
}

fn dirs(raw: &[&str]) -> Vec<RootDirectory> {
    raw.iter().filter_map(|r| RootDirectory::parse(r)).collect()
}

fn request(add: &[&str], remove: &[&str]) -> ChangeRequest {
    ChangeRequest::from_raw(add.iter().copied(), remove.iter().copied())
}

fn previous_sets() -> Vec<RootDirectorySet> {
    vec![
        RootDirectorySet::new(),
        RootDirectorySet::home(),
        set(&["/music"]),
        set(&["/music/rock", "/music/jazz"]),
        set(&["/a", "/b", "/c"]),
        set(&["/music2", "/podcasts/new"]),
    ]
}

fn requests() -> Vec<ChangeRequest> {
    vec![
        request(&[], &[]),
        request(&["$home"], &[]),
        request(&["$home", "/x"], &[]),
        request(&["/music"], &[]),
        request(&["/music/rock/live"], &[]),
        request(&["/a", "/a/b"], &["/a"]),
        request(&[], &["/b", "/does/not/exist"]),
        request(&["/podcasts"], &["$home"]),
        request(&["  ", "/d/"], &["/music2"]),
    ]
}

#[test]
fn test_final_set_is_always_well_formed() {
    for previous in previous_sets() {
        for req in requests() {
            let result = reconcile(&previous, &req);
            assert!(
                RootDirectorySet::is_well_formed(result.final_dirs.as_slice()),
                "{previous:?} + {req:?} gave {:?}",
                result.final_dirs
            );
        }
    }
}

#[test]
fn test_purge_only_names_dropped_previous_roots() {
    for previous in previous_sets() {
        for req in requests() {
            let result = reconcile(&previous, &req);
            for purged in &result.purge_dirs {
                assert!(previous.contains(purged), "{purged} was never configured");
                assert!(!result.final_dirs.contains(purged), "{purged} is still configured");
            }
            for kept in &previous {
                if !result.final_dirs.contains(kept) {
                    assert!(result.purge_dirs.contains(kept), "{kept} dropped without purge");
                }
            }
        }
    }
}

#[test]
fn test_reapplying_the_same_request_is_stable() {
    for previous in previous_sets() {
        for req in requests() {
            let first = reconcile(&previous, &req);
            let second = reconcile(&first.final_dirs, &req);
            assert_eq!(second.final_dirs, first.final_dirs, "{previous:?} + {req:?}");
            assert!(second.purge_dirs.is_empty(), "{previous:?} + {req:?}");
        }
    }
}

#[test]
fn test_home_addition_always_promotes() {
    for previous in previous_sets() {
        let result = reconcile(&previous, &request(&["/x", "$home"], &["/a"]));
        assert_eq!(result.final_dirs, RootDirectorySet::home());
        assert!(!result.purge_dirs.contains(&RootDirectory::Home));
    }
}

#[test]
fn test_unknown_removals_are_ignored() {
    for previous in previous_sets() {
        if previous.is_home() {
            continue;
        }
        let result = reconcile(&previous, &request(&[], &["/nowhere", "/elsewhere/deep"]));
        assert_eq!(result.final_dirs, previous);
        assert!(result.purge_dirs.is_empty());
        assert!(!result.unchanged);
    }
}

#[test]
fn test_new_parent_replaces_children() {
    let previous = set(&["/music/rock", "/music/jazz", "/podcasts"]);
    let result = reconcile(&previous, &request(&["/music"], &[]));

    assert_eq!(result.final_dirs.as_slice(), dirs(&["/podcasts", "/music"]).as_slice());
    assert_eq!(result.purge_dirs, dirs(&["/music/rock", "/music/jazz"]));
}

#[test]
fn test_sibling_prefix_is_not_a_child() {
    let previous = set(&["/music2"]);
    let result = reconcile(&previous, &request(&["/music"], &[]));

    assert_eq!(result.final_dirs.as_slice(), dirs(&["/music2", "/music"]).as_slice());
    assert!(result.purge_dirs.is_empty());
}

#[test]
fn test_home_reselected_is_a_noop() {
    let result = reconcile(&RootDirectorySet::home(), &request(&["$home"], &[]));
    assert!(result.unchanged);
    assert_eq!(result.final_dirs, RootDirectorySet::home());
    assert!(result.purge_dirs.is_empty());
}

#[test]
fn test_demotion_from_home_purges_home() {
    let result = reconcile(&RootDirectorySet::home(), &request(&["/music"], &["$home"]));
    assert_eq!(result.final_dirs, set(&["/music"]));
    assert_eq!(result.purge_dirs, vec![RootDirectory::Home]);
}

#[test]
fn test_json_request_round_trip_through_reconcile() {
    let body = br#"{"new_dirs": ["/music/", " /podcasts "], "removed": []}"#;
    let req = ChangeRequest::from_json_slice(body).unwrap();
    let result = reconcile(&RootDirectorySet::new(), &req);

    assert_eq!(result.final_dirs.to_strings(), vec!["/music", "/podcasts"]);
    assert_eq!(
        serde_json::to_value(&result.final_dirs).unwrap(),
        serde_json::json!(["/music", "/podcasts"])
    );
}
