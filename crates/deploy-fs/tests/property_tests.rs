use deploy_fs::NormalizedPath;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_paths_never_contain_traversal(segments in prop::collection::vec("[a-z]{1,4}|\\.\\.|\\.", 0..12)) {
        let raw = segments.join("/");
        let normalized = NormalizedPath::new(&raw);
        prop_assert!(!normalized.as_str().split('/').any(|s| s == ".." || s == "."));
        prop_assert!(!normalized.as_str().contains('\\'));
    }

    #[test]
    fn normalization_is_idempotent(raw in "[a-z./\\\\]{0,24}") {
        let once = NormalizedPath::new(&raw);
        let twice = NormalizedPath::new(once.as_str());
        prop_assert_eq!(once, twice);
    }
}
