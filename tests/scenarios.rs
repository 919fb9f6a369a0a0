//! End-to-end evolution scenarios, run against `InMemoryRevisionSource`
//! with hand-built fixtures rather than real repositories.

use chrono::NaiveDate;
use evoclone::{
    CodeBlock, ClonePair, EngineConfig, EvolutionEngine, GroupState, InMemoryRevisionSource,
    MatchType, MethodState, MethodStateDetail, Parameter, Revision,
};

fn block(id: &str, tokens: &[i64], hash: u64) -> CodeBlock {
    CodeBlock {
        block_id: id.to_string(),
        file_path: "f.rs".to_string(),
        start_line: 1,
        end_line: 10,
        function_name: id.to_string(),
        return_type: "()".to_string(),
        parameter_list: Vec::<Parameter>::new(),
        token_hash: hash,
        token_sequence: tokens.to_vec(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn method_row<'a>(
    rows: &'a [evoclone::MethodTraceRow],
    revision_id: &str,
    block_id: &str,
) -> &'a evoclone::MethodTraceRow {
    rows.iter()
        .find(|row| row.revision_id == revision_id && row.block_id == block_id)
        .unwrap_or_else(|| panic!("no method row for {revision_id}/{block_id}"))
}

// Scenario A: two blocks carried over unchanged by token_hash, no clone pairs.
#[test]
fn scenario_a_identical_revision() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    r1.blocks.insert("b1".into(), block("b1", &[1, 2, 3], 42));
    r1.blocks.insert("b2".into(), block("b2", &[4, 5, 6], 99));

    let mut r2 = Revision::new("r2", date(2024, 1, 11));
    r2.blocks.insert("b1p".into(), block("b1p", &[1, 2, 3], 42));
    r2.blocks.insert("b2p".into(), block("b2p", &[4, 5, 6], 99));

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let b1 = method_row(&output.method_trace, "r2", "b1p");
    assert_eq!(b1.state, MethodState::Survived);
    assert_eq!(b1.state_detail, MethodStateDetail::SurvivedUnchanged);
    assert_eq!(b1.match_type, MatchType::Exact);
    assert_eq!(b1.matched_block_id.as_deref(), Some("b1"));
    assert_eq!(b1.lifetime_revisions, 2);
    assert!(b1.clone_group_id.is_none());

    let b2 = method_row(&output.method_trace, "r2", "b2p");
    assert_eq!(b2.state_detail, MethodStateDetail::SurvivedUnchanged);
}

// Scenario B: a pure modification still clears the similarity threshold via
// n-gram overlap and is matched fuzzily.
#[test]
fn scenario_b_pure_modification() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    r1.blocks.insert("b1".into(), block("b1", &[1, 2, 3, 4, 5], 10));

    let mut r2 = Revision::new("r2", date(2024, 1, 2));
    r2.blocks.insert("b1_mod".into(), block("b1_mod", &[1, 2, 3, 4, 9], 11));

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let row = method_row(&output.method_trace, "r2", "b1_mod");
    assert_eq!(row.state, MethodState::Survived);
    assert_eq!(row.match_type, MatchType::Fuzzy);
    assert!(row.match_similarity.unwrap() >= EngineConfig::default().similarity_threshold);
}

// Scenario C: one survivor, one addition, two deletions.
#[test]
fn scenario_c_deletion_and_addition() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    r1.blocks.insert("x".into(), block("x", &[1, 2, 3], 1));
    r1.blocks.insert("y".into(), block("y", &[4, 5, 6], 2));
    r1.blocks.insert("z".into(), block("z", &[7, 8, 9], 3));

    let mut r2 = Revision::new("r2", date(2024, 1, 2));
    r2.blocks.insert("x2".into(), block("x2", &[1, 2, 3], 1));
    r2.blocks.insert("w".into(), block("w", &[900, 901, 902], 4));

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let x2 = method_row(&output.method_trace, "r2", "x2");
    assert_eq!(x2.state_detail, MethodStateDetail::SurvivedUnchanged);
    assert_eq!(x2.matched_block_id.as_deref(), Some("x"));

    let w = method_row(&output.method_trace, "r2", "w");
    assert_eq!(w.state_detail, MethodStateDetail::AddedIsolated);

    let y = method_row(&output.method_trace, "r2", "y");
    assert_eq!(y.state, MethodState::Deleted);
    assert_eq!(y.state_detail, MethodStateDetail::DeletedIsolated);

    let z = method_row(&output.method_trace, "r2", "z");
    assert_eq!(z.state, MethodState::Deleted);
    assert_eq!(z.state_detail, MethodStateDetail::DeletedIsolated);
}

// Scenario D: a 3-member clone group collapses to a single surviving member.
#[test]
fn scenario_d_group_dissolution() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    r1.blocks.insert("a".into(), block("a", &[1, 2, 3], 1));
    r1.blocks.insert("b".into(), block("b", &[1, 2, 4], 2));
    r1.blocks.insert("c".into(), block("c", &[1, 2, 5], 3));
    r1.clone_pairs.push(ClonePair {
        block_id_1: "a".into(),
        block_id_2: "b".into(),
        ngram_similarity: 80,
        lcs_similarity: None,
    });
    r1.clone_pairs.push(ClonePair {
        block_id_1: "b".into(),
        block_id_2: "c".into(),
        ngram_similarity: 85,
        lcs_similarity: None,
    });
    r1.clone_pairs.push(ClonePair {
        block_id_1: "a".into(),
        block_id_2: "c".into(),
        ngram_similarity: 82,
        lcs_similarity: None,
    });

    let mut r2 = Revision::new("r2", date(2024, 1, 2));
    r2.blocks.insert("a2".into(), block("a2", &[1, 2, 3], 1));

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let a2 = method_row(&output.method_trace, "r2", "a2");
    assert_eq!(a2.state_detail, MethodStateDetail::SurvivedCloneLost);

    let b = method_row(&output.method_trace, "r2", "b");
    assert_eq!(b.state, MethodState::Deleted);
    let c = method_row(&output.method_trace, "r2", "c");
    assert_eq!(c.state, MethodState::Deleted);

    let dissolved = output
        .group_trace
        .iter()
        .find(|row| row.revision_id == "r2" && row.state == GroupState::Dissolved);
    assert!(dissolved.is_some(), "expected a Dissolved group row at r2");
}

// Scenario E: a 2-member group grows to 3 members via exact matches plus one
// addition, well beyond the default size tolerance.
#[test]
fn scenario_e_group_growth() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    r1.blocks.insert("a".into(), block("a", &[1, 2, 3], 1));
    r1.blocks.insert("b".into(), block("b", &[1, 2, 4], 2));
    r1.clone_pairs.push(ClonePair {
        block_id_1: "a".into(),
        block_id_2: "b".into(),
        ngram_similarity: 90,
        lcs_similarity: None,
    });

    let mut r2 = Revision::new("r2", date(2024, 1, 2));
    r2.blocks.insert("a2".into(), block("a2", &[1, 2, 3], 1));
    r2.blocks.insert("b2".into(), block("b2", &[1, 2, 4], 2));
    r2.blocks.insert("c".into(), block("c", &[1, 2, 5], 3));
    r2.clone_pairs.push(ClonePair {
        block_id_1: "a2".into(),
        block_id_2: "b2".into(),
        ngram_similarity: 90,
        lcs_similarity: None,
    });
    r2.clone_pairs.push(ClonePair {
        block_id_1: "a2".into(),
        block_id_2: "c".into(),
        ngram_similarity: 85,
        lcs_similarity: None,
    });
    r2.clone_pairs.push(ClonePair {
        block_id_1: "b2".into(),
        block_id_2: "c".into(),
        ngram_similarity: 88,
        lcs_similarity: None,
    });

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let grown = output
        .group_trace
        .iter()
        .find(|row| row.revision_id == "r2" && row.state == GroupState::Grown)
        .expect("expected a Grown group row at r2");
    assert_eq!(grown.member_added, 1);
    assert_eq!(grown.member_removed, 0);
}

// Scenario F: an even split at exactly the default overlap threshold.
#[test]
fn scenario_f_split() {
    let mut r1 = Revision::new("r1", date(2024, 1, 1));
    for (id, tokens) in [
        ("a", [1i64, 2, 3]),
        ("b", [1, 2, 4]),
        ("c", [1, 2, 5]),
        ("d", [1, 2, 6]),
    ] {
        r1.blocks.insert(id.to_string(), block(id, &tokens, id.bytes().next().unwrap() as u64));
    }
    for (x, y, sim) in [("a", "b", 90), ("a", "c", 85), ("a", "d", 85), ("b", "c", 85), ("b", "d", 85), ("c", "d", 90)] {
        r1.clone_pairs.push(ClonePair {
            block_id_1: x.into(),
            block_id_2: y.into(),
            ngram_similarity: sim,
            lcs_similarity: None,
        });
    }

    let mut r2 = Revision::new("r2", date(2024, 1, 2));
    r2.blocks.insert("a2".into(), block("a2", &[1, 2, 3], b'a' as u64));
    r2.blocks.insert("b2".into(), block("b2", &[1, 2, 4], b'b' as u64));
    r2.blocks.insert("c2".into(), block("c2", &[1, 2, 5], b'c' as u64));
    r2.blocks.insert("d2".into(), block("d2", &[1, 2, 6], b'd' as u64));
    r2.clone_pairs.push(ClonePair {
        block_id_1: "a2".into(),
        block_id_2: "b2".into(),
        ngram_similarity: 90,
        lcs_similarity: None,
    });
    r2.clone_pairs.push(ClonePair {
        block_id_1: "c2".into(),
        block_id_2: "d2".into(),
        ngram_similarity: 90,
        lcs_similarity: None,
    });

    let source = InMemoryRevisionSource::new(vec![r1, r2]);
    let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
    let output = engine.run(&source).unwrap();

    let split = output
        .group_trace
        .iter()
        .find(|row| row.revision_id == "r2" && row.state == GroupState::Split);
    assert!(split.is_some(), "expected a Split group row at r2");
}
