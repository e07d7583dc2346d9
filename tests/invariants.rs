//! Whole-program correctness invariants the propagator and hierarchy must
//! hold on any fixture, not just the literal scenarios.

use std::fs;

use flow_analyze::context::AnalysisContext;
use flow_analyze::propagate::{build_hierarchy, propagate_exceptions};
use flow_core::config::ResolutionMode;
use flow_core::types::function_key;

fn build(files: &[(&str, &str)]) -> (tempfile::TempDir, flow_core::types::ProgramModel) {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).unwrap();
    }
    let model = flow_analyze::builder::build(dir.path(), &[]);
    (dir, model)
}

/// Invariant 1: every raise site's function is a real function in the
/// model, in the raise site's own file.
#[test]
fn raise_sites_point_at_real_functions_in_their_own_file() {
    let (_dir, model) = build(&[(
        "a.py",
        "def inner():\n    raise ValueError('x')\n\n\ndef outer():\n    inner()\n",
    )]);

    for raise in &model.raise_sites {
        let key = function_key(&raise.file, &raise.function);
        let func = model.functions.get(&key).expect("raise site function must exist in model");
        assert_eq!(func.file, raise.file);
    }
}

/// Invariant 2: subclass-of is reflexive, and a class is never its own
/// subclass in `get_all_subclasses`.
#[test]
fn hierarchy_subclass_of_is_reflexive_and_excludes_self_from_subclasses() {
    let (_dir, model) = build(&[(
        "errors.py",
        "class AppError(Exception):\n    pass\n\n\nclass ValidationError(AppError):\n    pass\n",
    )]);

    let hierarchy = build_hierarchy(&model);
    assert!(hierarchy.is_subclass_of("AppError", "AppError"));
    assert!(hierarchy.is_subclass_of("ValidationError", "AppError"));
    assert!(!hierarchy.get_all_subclasses("AppError").contains(&"AppError".to_string()));
    assert!(hierarchy.get_all_subclasses("AppError").contains(&"ValidationError".to_string()));
}

/// Invariant 3: direct raises are a subset of propagated raises.
#[test]
fn direct_raises_are_a_subset_of_propagated_raises() {
    let (_dir, model) = build(&[(
        "a.py",
        "def inner():\n    raise ValueError('x')\n\n\ndef outer():\n    inner()\n",
    )]);

    let mut ctx = AnalysisContext::new();
    let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, false, None, None);

    for (func, direct) in &result.direct_raises {
        let propagated = result.propagated_raises.get(func).cloned().unwrap_or_default();
        for exc in direct {
            assert!(propagated.contains(exc), "{func} direct-raises {exc} but it's missing from propagated");
        }
    }
}

/// Invariant 4: the fixpoint converges well inside the iteration bound on
/// a deep but finite call chain.
#[test]
fn propagation_reaches_a_fixpoint_on_a_long_call_chain() {
    let mut src = String::from("def f0():\n    raise ValueError('base')\n\n\n");
    for i in 1..40 {
        src.push_str(&format!("def f{i}():\n    f{}()\n\n\n", i - 1));
    }
    let (_dir, model) = build(&[("chain.py", &src)]);

    let mut ctx = AnalysisContext::new();
    let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, false, None, None);

    let top = result.propagated_raises.get("chain.py::f39").unwrap();
    assert!(top.contains("ValueError"));
}

/// Invariant 5: every evidence path replays edge-by-edge from the
/// function back to the raise site's own function, and every
/// intermediate key exists in the model.
#[test]
fn evidence_paths_replay_to_the_raise_sites_function() {
    let (_dir, model) = build(&[(
        "a.py",
        "def inner():\n    raise ValueError('x')\n\n\ndef middle():\n    inner()\n\n\ndef outer():\n    middle()\n",
    )]);

    let mut ctx = AnalysisContext::new();
    let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, false, None, None);

    let outer_key = "a.py::outer";
    let evidence = result.propagated_with_evidence.get(outer_key).expect("outer should have evidence");

    for prop_raise in evidence.values() {
        let mut current = outer_key.to_string();
        for edge in &prop_raise.path {
            assert_eq!(edge.caller, current, "path must start where the previous hop left off");
            assert!(model.functions.contains_key(&edge.caller) || edge.caller == outer_key);
            current = edge.callee.clone();
        }
        assert_eq!(
            current,
            function_key(&prop_raise.raise_site.file, &prop_raise.raise_site.function),
            "path must land at the raise site's own function"
        );
    }
}

/// Invariant 6: a catch that doesn't re-raise removes the caught type
/// from what the catching function lets escape.
#[test]
fn non_reraising_catch_removes_the_type_from_what_escapes() {
    let (_dir, model) = build(&[(
        "a.py",
        "def inner():\n    raise ValueError('x')\n\n\ndef outer():\n    try:\n        inner()\n    except ValueError:\n        pass\n",
    )]);

    let mut ctx = AnalysisContext::new();
    let result = propagate_exceptions(&model, &mut ctx, ResolutionMode::Default, false, None, None);

    let outer = result.propagated_raises.get("a.py::outer").cloned().unwrap_or_default();
    assert!(!outer.contains("ValueError"));
}

/// Invariant 7: confidence never exceeds high for an empty path, and
/// never rises as a heuristic edge is added.
#[test]
fn confidence_never_rises_once_a_heuristic_edge_is_on_the_path() {
    use flow_analyze::types::compute_confidence;
    use flow_core::types::{Confidence, ResolutionKind};

    let exact_edge = flow_analyze::types::ResolutionEdge {
        caller: "a.py::outer".to_string(),
        callee: "a.py::inner".to_string(),
        file: "a.py".to_string(),
        line: 2,
        resolution_kind: ResolutionKind::SelfMethod,
        is_heuristic: false,
        match_count: 1,
    };
    let medium_edge = flow_analyze::types::ResolutionEdge {
        resolution_kind: ResolutionKind::NameFallback,
        is_heuristic: true,
        match_count: 1,
        ..exact_edge.clone()
    };
    let low_edge = flow_analyze::types::ResolutionEdge {
        resolution_kind: ResolutionKind::Polymorphic,
        is_heuristic: true,
        match_count: 3,
        ..exact_edge.clone()
    };

    assert_eq!(compute_confidence(&[]), Confidence::High);
    assert_eq!(compute_confidence(&[exact_edge.clone()]), Confidence::High);
    assert_eq!(compute_confidence(&[exact_edge.clone(), medium_edge]), Confidence::Medium);
    assert!(compute_confidence(&[exact_edge, low_edge]) < Confidence::High);
}

/// Invariant 8: serializing then deserializing an extraction round-trips
/// to an identical value, the cache's whole reason for existing.
#[test]
fn cache_round_trips_an_extraction_byte_identically() {
    use flow_core::cache::FileCache;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.py");
    fs::write(&file, "def f():\n    raise ValueError('x')\n").unwrap();

    let source = fs::read(&file).unwrap();
    let extraction = flow_extract::extractor::extract(&source, &file.to_string_lossy(), "a.py");

    let cache = FileCache::in_memory().unwrap();
    cache.put("a.py", 1, source.len() as i64, "fingerprint", &extraction);

    let round_tripped = cache.get("a.py", 1, source.len() as i64).expect("cache hit");
    assert_eq!(round_tripped, extraction);
}
