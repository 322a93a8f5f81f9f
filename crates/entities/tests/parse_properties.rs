use graft_entities::{parse_fragment, parse_project, EntityKind, ProjectIndex, ScanConfig};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

const INVALID_SOURCES: &[&str] = &[
    "def f(:",
    "class :\n    pass\n",
    "x = (1,\n",
    "def ok():\n    return 1\n\ndef broken(\n",
    "if True\n    pass\n",
    "print \"hi\"\n",
    "exec \"x = 1\"\n",
    "def f(a, a):\n    pass\n",
    "def f(a=1, b):\n    pass\n",
    "def f(*):\n    pass\n",
    "x := 1\n",
    "f(**k, *a)\n",
    "class C:\n    def m(self, x, x):\n        pass\n",
];

#[test]
fn invalid_sources_degrade_to_module_error_with_verbatim_text() {
    for source in INVALID_SOURCES {
        let tree = parse_fragment(source);
        assert_eq!(tree.root().kind, EntityKind::ModuleError, "source: {source:?}");
        assert!(
            tree.root().source_text.starts_with("# parse error: "),
            "source: {source:?}"
        );
        assert!(
            tree.root().source_text.ends_with(source),
            "module_error must embed the original text verbatim: {source:?}"
        );
        assert_eq!(tree.len(), 1);
    }
}

#[test]
fn children_preserve_source_order_and_back_references() {
    let code = r#"
from __future__ import annotations
import json

def first():
    pass

class Second:
    def a(self):
        pass

    @property
    def b(self):
        return 1

def third(x, y):
    return x + y

LOOKUP = {}
"#;
    let tree = parse_fragment(code);
    let top: Vec<_> = tree.top_level().map(|e| e.name.as_str()).collect();
    assert_eq!(top, vec!["imports", "first", "Second", "third", "globals"]);

    for entity in tree.iter_preorder().skip(1) {
        let parent = tree.parent(entity.id).expect("non-root entities have a parent");
        assert!(parent.children.contains(&entity.id));
        assert!(entity.start_line >= parent.start_line);
        assert!(entity.end_line <= parent.end_line);
    }

    let second = tree.find("Second", EntityKind::Class).unwrap();
    let methods: Vec<_> = tree.children(second.id).map(|e| e.name.as_str()).collect();
    assert_eq!(methods, vec!["a", "b"]);

    let b = tree.find("b", EntityKind::Method).unwrap();
    assert!(b.source_text.trim_start().starts_with("@property"));
}

#[test]
fn reparsing_yields_identical_trees() {
    let code = "import os\n\nclass A:\n    def m(self):\n        pass\n";
    assert_eq!(parse_fragment(code), parse_fragment(code));
}

#[test]
fn parse_project_maps_each_source_file() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("app/models")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join("app/__init__.py"), "").unwrap();
    fs::write(
        root.join("app/models/user.py"),
        "class User:\n    def save(self):\n        pass\n",
    )
    .unwrap();
    fs::write(root.join(".git/hook.py"), "def hook():\n    pass\n").unwrap();
    fs::write(root.join("notes.txt"), "def not_python():\n").unwrap();

    let trees = parse_project(root, &ScanConfig::default()).unwrap();
    let paths: Vec<_> = trees.keys().cloned().collect();
    assert_eq!(
        paths,
        vec![root.join("app/__init__.py"), root.join("app/models/user.py")]
    );
    assert_eq!(trees[&root.join("app/models/user.py")].root().name, "user");

    let index = ProjectIndex::from_trees(root, trees);
    let save = index.find("save", EntityKind::Method).unwrap();
    assert_eq!(save.path, root.join("app/models/user.py"));
    assert!(index.find("hook", EntityKind::Function).is_none());
}
