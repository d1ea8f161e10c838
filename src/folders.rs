use crate::eagle::FolderRecord;

/// Pre-order depth-first search: a node's children are visited before its
/// next sibling. The first match wins when an id occurs more than once.
///
/// Uses an explicit stack so deeply nested libraries cannot overflow.
pub fn find_folder<'a>(target: &str, forest: &'a [FolderRecord]) -> Option<&'a FolderRecord> {
    let mut stack: Vec<&FolderRecord> = forest.iter().rev().collect();
    while let Some(folder) = stack.pop() {
        if folder.id == target {
            return Some(folder);
        }
        stack.extend(folder.children.iter().rev());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, name: &str, children: Vec<FolderRecord>) -> FolderRecord {
        FolderRecord {
            id: id.into(),
            name: name.into(),
            children,
            ..FolderRecord::default()
        }
    }

    fn forest() -> Vec<FolderRecord> {
        vec![
            folder(
                "AAAAAAAAAAAAA",
                "root-a",
                vec![folder(
                    "BBBBBBBBBBBBB",
                    "child-b",
                    vec![folder("DUPLICATEIDXX", "deep-first", vec![])],
                )],
            ),
            folder("DUPLICATEIDXX", "sibling-second", vec![]),
            folder("CCCCCCCCCCCCC", "root-c", vec![]),
        ]
    }

    #[test]
    fn finds_roots_and_nested_nodes() {
        let forest = forest();
        assert_eq!(find_folder("CCCCCCCCCCCCC", &forest).map(|f| f.name.as_str()), Some("root-c"));
        assert_eq!(find_folder("BBBBBBBBBBBBB", &forest).map(|f| f.name.as_str()), Some("child-b"));
    }

    #[test]
    fn children_are_visited_before_next_sibling() {
        let forest = forest();
        let found = find_folder("DUPLICATEIDXX", &forest).expect("present");
        assert_eq!(found.name, "deep-first");
    }

    #[test]
    fn missing_id_is_none() {
        assert!(find_folder("ZZZZZZZZZZZZZ", &forest()).is_none());
        assert!(find_folder("AAAAAAAAAAAAA", &[]).is_none());
    }

    #[test]
    fn survives_very_deep_chains() {
        let mut node = folder("LEAFLEAFLEAF1", "leaf", vec![]);
        for depth in 0..100_000 {
            node = folder(&format!("{depth:013}"), "link", vec![node]);
        }
        let forest = vec![node];
        let found = find_folder("LEAFLEAFLEAF1", &forest).map(|f| f.name.clone());
        assert_eq!(found.as_deref(), Some("leaf"));
        // Dropping a 100k-deep tree recurses in the compiler-generated drop glue.
        unwind_chain(forest);
    }

    fn unwind_chain(mut forest: Vec<FolderRecord>) {
        while let Some(mut node) = forest.pop() {
            forest.append(&mut node.children);
        }
    }
}
