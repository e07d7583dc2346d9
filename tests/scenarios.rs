//! End-to-end fixtures mirroring the literal scenarios a whole-program
//! audit is expected to get right: direct HTTP-route raises, remote and
//! generic handlers, factory-raise rewriting, DRF dispatch injection, and
//! polymorphic confidence.

use std::fs;

use flow_analyze::integration_queries::audit_integration;
use flow_analyze::integrations::{default_integrations, generic::FLASK_CONFIG, Integration};
use flow_core::types::ResolutionKind;

fn build(files: &[(&str, &str)]) -> (tempfile::TempDir, flow_core::types::ProgramModel) {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
    let integrations = default_integrations();
    let model = flow_analyze::builder::build(dir.path(), &integrations);
    (dir, model)
}

#[test]
fn direct_http_route_raise_is_caught_by_global_handler() {
    let (_dir, model) = build(&[(
        "app.py",
        r#"
class AppError(Exception):
    pass


class ValidationError(AppError):
    pass


def validate_input():
    raise ValidationError("bad input")


@app.route("/users", methods=["POST"])
def create_user():
    validate_input()


@app.errorhandler(AppError)
def handle_app_error(e):
    pass
"#,
    )]);

    let flask = Box::new(flow_analyze::integrations::generic::GenericIntegration::new(FLASK_CONFIG()));
    let entrypoints: Vec<_> = model
        .entrypoints
        .iter()
        .filter(|e| e.metadata.get("framework").map(String::as_str) == Some("flask"))
        .cloned()
        .collect();
    assert_eq!(entrypoints.len(), 1);

    let result = audit_integration(&model, flask.as_ref(), &entrypoints, &model.global_handlers, None);
    assert_eq!(result.clean_count, 1);
    assert!(result.issues.is_empty());
}

#[test]
fn generic_catch_all_is_flagged_even_though_nothing_escapes() {
    let (_dir, model) = build(&[(
        "app.py",
        r#"
class UnknownError(Exception):
    pass


@app.route("/danger")
def risky():
    raise UnknownError("surprise")


@app.errorhandler(Exception)
def handle_anything(e):
    pass
"#,
    )]);

    let flask = Box::new(flow_analyze::integrations::generic::GenericIntegration::new(FLASK_CONFIG()));
    let entrypoints = model.entrypoints.clone();
    let result = audit_integration(&model, flask.as_ref(), &entrypoints, &model.global_handlers, None);

    assert_eq!(result.clean_count, 0);
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].caught_by_generic.contains_key("UnknownError"));
    assert!(result.issues[0].uncaught.is_empty());
}

#[test]
fn factory_raise_is_rewritten_to_its_declared_return_type() {
    let (_dir, model) = build(&[(
        "app.py",
        r#"
def http_exception(code, msg) -> HTTPException:
    pass


@app.route("/items/<id>")
def get_item(id):
    raise http_exception(404, "not found")
"#,
    )]);

    let found = flow_analyze::queries::find_raises(&model, "HTTPException", false);
    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.matches[0].function, "app.py::get_item");
}

#[test]
fn drf_class_view_gets_implicit_dispatch_edges_to_its_methods() {
    let (_dir, model) = build(&[(
        "views.py",
        r#"
from rest_framework.views import APIView


class UserAPIView(APIView):
    def get(self, request):
        raise ValueError("no user")

    def post(self, request):
        pass
"#,
    )]);

    let dispatch_edges: Vec<_> = model
        .call_sites
        .iter()
        .filter(|c| c.resolution_kind == ResolutionKind::ImplicitDispatch && c.caller_simple == "UserAPIView")
        .collect();

    assert_eq!(dispatch_edges.len(), 2);
    assert!(dispatch_edges.iter().any(|c| c.callee_simple == "get"));
    assert!(dispatch_edges.iter().any(|c| c.callee_simple == "post"));
}

#[test]
fn flask_method_view_class_gets_implicit_dispatch_edges_to_its_methods() {
    let (_dir, model) = build(&[(
        "views.py",
        r#"
from flask.views import MethodView


class UserView(MethodView):
    def get(self):
        raise ValueError("no user")

    def post(self):
        pass
"#,
    )]);

    assert!(model.entrypoints.iter().any(|e| e.function == "UserView" && e.metadata.get("view_type").map(String::as_str) == Some("class")));

    let dispatch_edges: Vec<_> = model
        .call_sites
        .iter()
        .filter(|c| c.resolution_kind == ResolutionKind::ImplicitDispatch && c.caller_simple == "UserView")
        .collect();

    assert_eq!(dispatch_edges.len(), 2);
    assert!(dispatch_edges.iter().any(|c| c.callee_simple == "get"));
    assert!(dispatch_edges.iter().any(|c| c.callee_simple == "post"));
}

#[test]
fn polymorphic_call_propagates_every_subclass_raise_at_low_confidence() {
    let (_dir, model) = build(&[(
        "service.py",
        r#"
class Service:
    def process(self):
        raise NotImplementedError()


class ServiceA(Service):
    def process(self):
        raise RuntimeError("a failed")


class ServiceB(Service):
    def process(self):
        raise OSError("b failed")


def run_polymorphic(s: Service):
    s.process()


def run_concrete():
    s = ServiceA()
    s.process()
"#,
    )]);

    let mut ctx = flow_analyze::context::AnalysisContext::new();
    let propagation = flow_analyze::propagate::propagate_exceptions(
        &model,
        &mut ctx,
        flow_core::config::ResolutionMode::Default,
        false,
        None,
        None,
    );

    let poly = propagation.propagated_raises.get("service.py::run_polymorphic").unwrap();
    assert!(poly.contains("RuntimeError"));
    assert!(poly.contains("OSError"));

    let concrete = propagation.propagated_raises.get("service.py::run_concrete").unwrap();
    assert!(concrete.contains("RuntimeError"));
    assert!(!concrete.contains("OSError"));
}
