//! Property-based tests for spec normalization and job output parsing.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::git::{added_commits, is_commit_hash, parse_default_branch};
    use crate::spec::{default_name, expand_source, is_github_shorthand, normalize, SpecOptions};
    use proptest::prelude::*;
    use std::path::Path;

    // ============================================================================
    // normalize property tests
    // ============================================================================

    proptest! {
        /// Property: owner/repo shorthands expand to a GitHub URL named after the repo
        #[test]
        fn shorthand_expands_to_github(
            owner in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,20}",
            repo in "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,20}",
        ) {
            let source = format!("{}/{}", owner, repo);
            let spec = normalize(&source, SpecOptions::default(), Path::new("/plugins")).unwrap();
            prop_assert_eq!(&spec.source, &format!("https://github.com/{}", source));
            prop_assert_eq!(&spec.name, &repo);
            prop_assert_eq!(spec.path, Path::new("/plugins").join(&repo));
        }

        /// Property: expansion is idempotent
        #[test]
        fn expand_source_is_idempotent(input in "\\PC{0,40}") {
            let once = expand_source(&input);
            prop_assert_eq!(expand_source(&once), once.clone());
        }

        /// Property: absolute and dot-relative paths are never rewritten
        #[test]
        fn paths_are_not_shorthands(rest in "[a-z]{1,10}/[a-z]{1,10}") {
            let absolute = format!("/{}", rest);
            let dotted = format!("./{}", rest);
            prop_assert!(!is_github_shorthand(&absolute));
            prop_assert!(!is_github_shorthand(&dotted));
            prop_assert_eq!(expand_source(&dotted), dotted.clone());
        }

        /// Property: an inferred name never contains a path separator
        #[test]
        fn default_name_has_no_separators(input in "\\PC{0,40}") {
            if let Some(name) = default_name(&input) {
                prop_assert!(!name.is_empty());
                prop_assert!(!name.contains('/'));
                prop_assert!(!name.contains('\\'));
            }
        }

        /// Property: normalization either fails or yields a path directly under the root
        #[test]
        fn normalized_path_is_child_of_root(input in "\\PC{0,40}") {
            let root = Path::new("/plugins");
            if let Ok(spec) = normalize(&input, SpecOptions::default(), root) {
                prop_assert_eq!(spec.path.parent(), Some(root));
            }
        }
    }

    // ============================================================================
    // git output parsing property tests
    // ============================================================================

    proptest! {
        /// Property: hex strings of commit length are commit hashes
        #[test]
        fn hex_strings_are_commit_hashes(hash in "[0-9a-f]{7,40}") {
            prop_assert!(is_commit_hash(&hash));
            let padded = format!("{}\n", hash);
            prop_assert!(is_commit_hash(&padded));
        }

        /// Property: a default branch survives a round trip through origin/<branch>
        #[test]
        fn default_branch_round_trip(branch in "[a-z][a-z0-9/_.-]{0,20}") {
            prop_assume!(branch != "HEAD");
            let output = format!("origin/{}\n", branch);
            prop_assert_eq!(parse_default_branch(&output), Some(branch));
        }

        /// Property: added_commits keeps exactly the `>` lines
        #[test]
        fn added_commits_counts_right_side(
            right in 0usize..10,
            left in 0usize..10,
        ) {
            let mut lines: Vec<String> = (0..right).map(|i| format!("> {:07x} right", i)).collect();
            lines.extend((0..left).map(|i| format!("< {:07x} left", i)));
            prop_assert_eq!(added_commits(&lines).len(), right);
        }
    }
}
