use std::sync::Arc;

use bdi_epistemic::reasoner::{RecordedRequest, RecordingReasoner};
use bdi_epistemic::syntax::{parse_formula, parse_literal};
use bdi_epistemic::{
    BeliefBase, EpistemicExtension, EpistemicFormulaLiteral, EpistemicModality, ExtensionConfig, Formula,
    InMemoryBeliefBase, InMemoryPlanLibrary, InternalActions, Rewriter, Unifier,
};

fn created(src: &str) -> (EpistemicExtension, Arc<RecordingReasoner>) {
    let reasoner = Arc::new(RecordingReasoner::new());
    let mut ext = EpistemicExtension::new(
        Arc::new(InMemoryBeliefBase::new()),
        Arc::new(InMemoryPlanLibrary::new()),
        reasoner.clone(),
        ExtensionConfig::default(),
    )
    .unwrap();
    ext.load_source(src).unwrap();
    ext.create_model().unwrap();
    (ext, reasoner)
}

fn know(src: &str) -> Formula {
    Formula::modal(
        EpistemicModality::Know,
        Formula::literal(&parse_literal(src).unwrap()).unwrap(),
    )
}

#[test]
fn modality_literals_parse_into_their_parts() {
    let cases = [
        ("know(p)", EpistemicModality::Know, false, false),
        ("~know(p)", EpistemicModality::Know, true, false),
        ("possible(~p)", EpistemicModality::Possible, false, true),
        ("~possible(p)", EpistemicModality::Possible, true, false),
    ];
    for (src, modality, modality_negated, prop_negated) in cases {
        let parsed = EpistemicFormulaLiteral::parse(&parse_literal(src).unwrap()).unwrap();
        assert_eq!(parsed.modality(), modality, "{src}");
        assert_eq!(parsed.modality_negated(), modality_negated, "{src}");
        assert_eq!(parsed.proposition_negated(), prop_negated, "{src}");
        assert_eq!(parsed.root_literal().to_string(), if prop_negated { "~p" } else { "p" });
    }
}

#[test]
fn plan_context_resolves_knowledge_through_the_reasoner() {
    let (ext, reasoner) = created("range(loc(1)). range(loc(2)).");
    reasoner.set_true(&know("loc(2)"));

    let view = ext.query_base();
    let ranges = ext.ranges().clone();
    let actions = InternalActions::with_builtins();
    let rewriter = Rewriter::new(&view, &ranges, &actions);
    let results = rewriter
        .consequences(&parse_formula("know(loc(X))").unwrap(), &Unifier::new())
        .unwrap();

    let bound: Vec<String> = results
        .iter()
        .map(|ru| ru.unifier().apply_literal(&parse_literal("loc(X)").unwrap()).to_string())
        .collect();
    assert_eq!(bound, vec!["loc(2)"]);

    let batches = reasoner
        .requests()
        .into_iter()
        .filter(|r| matches!(r, RecordedRequest::EvaluateFormulas(_)))
        .count();
    assert_eq!(batches, 1);
}

#[test]
fn negated_groundings_are_queried_separately() {
    let (ext, reasoner) = created("range(loc(1)).");
    reasoner.set_true(&Formula::modal(
        EpistemicModality::Possible,
        Formula::literal(&parse_literal("~loc(1)").unwrap()).unwrap(),
    ));
    let view = ext.query_base();
    let found = view
        .candidates(&parse_literal("possible(~loc(X))").unwrap(), &Unifier::new())
        .unwrap();
    let heads: Vec<String> = found.iter().map(|e| e.head().to_string()).collect();
    assert_eq!(heads, vec!["possible(~loc(1))"]);
}

#[test]
fn evaluate_wraps_formula_in_modality() {
    let (ext, reasoner) = created("range(loc(1)).");
    reasoner.set_true(&know("loc(1)"));
    let p = Formula::literal(&parse_literal("loc(1)").unwrap()).unwrap();
    assert!(ext.evaluate(EpistemicModality::Know, &p).unwrap());
    assert!(!ext.evaluate(EpistemicModality::Possible, &p).unwrap());
    assert_eq!(
        reasoner.requests().last(),
        Some(&RecordedRequest::EvaluateFormula(
            bdi_epistemic::reasoner::protocol::EvaluateFormulaRequest {
                formula: Formula::modal(EpistemicModality::Possible, p),
            }
        ))
    );
}

#[test]
fn writes_through_the_view_reach_the_ground_base() {
    let (ext, _) = created("");
    let view = ext.query_base();
    view.add(parse_literal("door(open)").unwrap().into()).unwrap();
    assert!(ext.beliefs().contains(&parse_literal("door(open)").unwrap()).unwrap());
    assert_eq!(view.len().unwrap(), ext.beliefs().len().unwrap());
}
