//! Probe query construction from plan fixtures.

use pilotscope_core::prelude::*;
use pilotscope_planner::{
    join_rel_probe, parse_yaml_fixture, unparse_join_rel, CardinalityCache, ProbeTarget,
};

const STATS_JOIN: &str = r#"
relations:
  - { id: 1, name: comments, alias: c }
  - id: 2
    name: posts
    alias: p
    filters:
      - { op: "<=", args: [ { col: p.answercount }, { int: 5 } ] }
  - id: 3
    name: users
    alias: u
    filters:
      - { op: ">=", args: [ { col: u.reputation }, { num: "10.5" } ] }
probe:
  join:
    relids: [3, 1, 2]
    filters:
      - { op: "=", args: [ { col: u.id }, { col: c.userid } ] }
    outer_path:
      gather:
        hash_join:
          join_filters:
            - { op: "=", args: [ { col: c.postid }, { col: p.id } ] }
          outer: { scan: { rel: 1 } }
          inner: { scan: { rel: 2 } }
    inner_path: { scan: { rel: 3 } }
default_rows: 250
"#;

#[test]
fn test_unparse_is_deterministic() {
    let fixture = parse_yaml_fixture(STATS_JOIN).unwrap();
    let ProbeTarget::Join(join) = &fixture.target else {
        panic!("expected a join probe");
    };

    let mut first = String::new();
    let mut second = String::from("leftover from a previous call");
    unparse_join_rel(&fixture.catalog, join, &mut first).unwrap();
    unparse_join_rel(&fixture.catalog, join, &mut second).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_join_fixture_text() {
    let fixture = parse_yaml_fixture(STATS_JOIN).unwrap();
    assert_eq!(fixture.default_rows, 250.0);
    assert_eq!(
        fixture.probe().unwrap(),
        "select count(*) from users u, comments c, posts p \
         where u.id = c.userid and c.postid = p.id \
         and u.reputation >= 10.5 and p.answercount <= 5;"
    );
}

#[test]
fn test_probe_text_is_cache_key() {
    let catalog: RelCatalog = [
        BaseRel::new(RelId::new(1), "a", "a"),
        BaseRel::new(RelId::new(2), "b", "b")
            .with_filter(Expr::binary("=", Expr::column("b", "kind"), Expr::text("x"))),
    ]
    .into_iter()
    .collect();
    let join = JoinRel {
        relids: [RelId::new(1), RelId::new(2)].into_iter().collect(),
        filters: vec![],
        outer_path: Some(Path::scan(RelId::new(1))),
        inner_path: Some(Path::MergeJoin(JoinPath::new(
            vec![Expr::binary("=", Expr::column("a", "id"), Expr::column("b", "aid"))],
            Path::scan(RelId::new(1)),
            Path::scan(RelId::new(2)),
        ))),
    };
    let probe = join_rel_probe(&catalog, &join).unwrap();
    assert_eq!(
        probe,
        "select count(*) from a, b where a.id = b.aid and b.kind = 'x';"
    );

    let cache = CardinalityCache::build([(probe.clone(), 42.0)]);
    assert_eq!(cache.get(&probe), Some(42.0));
    assert_eq!(cache.get("select count(*) from a, b;"), None);
}
