use focal_common::naming::{path_for_prompt_name, prompt_name_for_path, PROMPT_DIRS};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,12}"
}

fn prompt_path() -> impl Strategy<Value = String> {
    (prop::sample::select(PROMPT_DIRS), prop::collection::vec(segment(), 1..4))
        .prop_map(|(dir, segments)| format!("{dir}/{}.md", segments.join("/")))
}

proptest! {
    #[test]
    fn prompt_paths_round_trip_through_names(path in prompt_path()) {
        let name = prompt_name_for_path(&path).expect("prompt path should have a name");
        prop_assert_eq!(path_for_prompt_name(&name), Some(path));
    }

    #[test]
    fn names_never_contain_separators(path in prompt_path()) {
        let name = prompt_name_for_path(&path).expect("prompt path should have a name");
        prop_assert!(!name.contains('/'));
        prop_assert!(!name.ends_with(".md"));
    }

    #[test]
    fn paths_outside_prompt_dirs_have_no_name(
        dir in "[a-z]{1,8}",
        segments in prop::collection::vec(segment(), 1..3),
    ) {
        prop_assume!(!PROMPT_DIRS.contains(&dir.as_str()));
        let path = format!("{dir}/{}.md", segments.join("/"));
        prop_assert_eq!(prompt_name_for_path(&path), None);
    }
}
