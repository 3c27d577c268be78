use serde_json::json;
use swarm_core::controller::{full_route, normalize_path};
use swarm_core::meta::{ArgSource, MethodMeta, SchemaRef};
use swarm_core::{Access, Args, Controller, ControllerMeta, Controllers, HttpVerb};

async fn noop(_: Args) -> Result<serde_json::Value, swarm_core::ApiError> {
    Ok(json!(null))
}

struct Users;

impl Controller for Users {
    fn describe(meta: &mut ControllerMeta) {
        meta.title("Users")
            .prefix("users/", false)
            .versions(["v1", "v2"])
            .access("users");
        meta.method("login").post("login").handler(noop);
        meta.method("me")
            .get("/me")
            .access(Access::authenticated())
            .version("v2")
            .handler(noop);
        // Helper without routing metadata.
        meta.method("helper").title("Not a route").handler(noop);
    }
}

#[test]
fn controller_name_defaults_to_type_name() {
    assert_eq!(Users::name(), "Users");
    assert_eq!(Users::meta().name, "Users");
}

struct Store<T>(std::marker::PhantomData<T>);

impl<T: Send + Sync + 'static> Controller for Store<T> {
    fn describe(meta: &mut ControllerMeta) {
        meta.prefix("/store", false);
    }
}

#[test]
fn generic_controller_name_drops_type_arguments() {
    assert_eq!(Store::<std::collections::HashMap<String, u8>>::name(), "Store");
    assert_eq!(Store::<Users>::name(), "Store");
}

#[test]
fn has_version_covers_controllers_methods_and_the_default() {
    let mut controllers = Controllers::new("v0");
    controllers.add::<Users>();

    assert!(controllers.has_version("v0"));
    assert!(controllers.has_version("v2"));
    assert!(!controllers.has_version("v3"));
    assert!(!controllers.has_version("<script>"));
}

#[test]
fn methods_inherit_controller_defaults_only_when_absent() {
    let mut controllers = Controllers::new("v1");
    controllers.add::<Users>();

    let users = controllers.get("Users").unwrap();
    assert_eq!(users.prefix, "/users");
    assert_eq!(users.versions, vec!["v1", "v2"]);

    let login = users.method("login").unwrap();
    assert_eq!(login.full_route, "/users/login");
    assert_eq!(login.versions, vec!["v1", "v2"]);
    assert_eq!(login.effective_access(users), Some(&Access::from("users")));
    assert!(login.access.is_none());

    let me = users.method("me").unwrap();
    assert_eq!(me.versions, vec!["v2"]);
    // An explicit empty requirement is kept, not replaced by the controller's.
    assert_eq!(me.effective_access(users), Some(&Access::authenticated()));
}

#[test]
fn controller_defaults() {
    let mut controllers = Controllers::new("v3");
    let mut meta = ControllerMeta::new("Bare");
    meta.method("index").get("/").handler(noop);
    controllers.register(meta);

    let bare = controllers.get("Bare").unwrap();
    assert_eq!(bare.prefix, "/");
    assert!(!bare.root);
    assert!(bare.access.is_none());
    assert_eq!(bare.versions, vec!["v3"]);
    let index = bare.method("index").unwrap();
    assert_eq!(index.full_route, "/");
    assert_eq!(index.url(bare, "v3"), "/v3");
}

#[test]
fn non_routable_methods_are_dropped() {
    let mut controllers = Controllers::new("v1");
    controllers.add::<Users>();
    let users = controllers.get("Users").unwrap();
    assert!(users.method("helper").is_none());

    let mut meta = ControllerMeta::new("Partial");
    meta.method("no_verb").handler(noop);
    meta.method("no_handler").get("/x");
    controllers.register(meta);
    assert!(controllers.get("Partial").unwrap().methods.is_empty());
    assert!(controllers
        .routable()
        .all(|(_, m)| m.name != "helper" && m.name != "no_verb" && m.name != "no_handler"));
}

#[test]
fn registering_twice_replaces_the_controller_in_place() {
    let mut controllers = Controllers::new("v1");
    let mut first = ControllerMeta::new("Things");
    first.title("First").access("old");
    first.method("list").get("/").handler(noop);
    controllers.register(first);

    let mut other = ControllerMeta::new("Other");
    other.method("list").get("/").handler(noop);
    controllers.register(other);

    let mut second = ControllerMeta::new("Things");
    second.prefix("/things", false);
    second.method("show").get("/:id").handler(noop);
    controllers.register(second);

    assert_eq!(controllers.len(), 2);
    assert_eq!(controllers.list()[0].name, "Things");
    let things = controllers.get("Things").unwrap();
    assert!(things.title.is_none());
    assert!(things.access.is_none());
    assert!(things.method("list").is_none());
    assert_eq!(things.method("show").unwrap().full_route, "/things/:id");
}

#[test]
fn add_method_replaces_by_name() {
    let mut controllers = Controllers::new("v1");
    controllers.add::<Users>();

    let mut replacement = MethodMeta::new("login");
    replacement.put("/session").handler(noop);
    controllers.add_method("Users", replacement);

    let users = controllers.get("Users").unwrap();
    let login = users.method("login").unwrap();
    assert_eq!(login.verb, HttpVerb::Put);
    assert_eq!(login.full_route, "/users/session");
    assert_eq!(users.methods.len(), 2);
}

#[test]
fn add_method_to_unknown_controller_is_ignored() {
    let mut controllers = Controllers::new("v1");
    let mut meta = MethodMeta::new("orphan");
    meta.get("/").handler(noop);
    controllers.add_method("Nobody", meta);
    assert!(controllers.is_empty());
}

#[test]
fn returns_are_overwritten_by_code() {
    let mut meta = MethodMeta::new("show");
    meta.returns(200, "S1", "ok").returns(404, "S2", "missing");

    let mut later = MethodMeta::new("show");
    later.returns(200, "S3", "ok again");
    meta.merge(later);

    let codes: Vec<(&str, Option<&SchemaRef>)> = meta
        .returns
        .iter()
        .map(|r| (r.code.as_str(), r.schema.as_ref()))
        .collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&("200", Some(&SchemaRef::from("S3")))));
    assert!(codes.contains(&("404", Some(&SchemaRef::from("S2")))));
}

#[test]
fn query_and_parameters_last_registration_wins() {
    let mut meta = MethodMeta::new("search");
    meta.query("q", json!({ "type": "string" }), "first")
        .query("page", json!({ "type": "integer" }), "")
        .query("q", json!({ "type": "number" }), "second");

    assert_eq!(meta.query.len(), 2);
    let q = meta.query.iter().find(|p| p.name == "q").unwrap();
    assert_eq!(q.description.as_deref(), Some("second"));
    assert_eq!(q.schema, Some(SchemaRef::Inline(json!({ "type": "number" }))));
    let page = meta.query.iter().find(|p| p.name == "page").unwrap();
    assert!(page.description.is_none());
}

#[test]
fn default_argument_bindings_are_request_and_response() {
    let mut controllers = Controllers::new("v1");
    controllers.add::<Users>();
    let login = controllers.get("Users").unwrap().method("login").unwrap().clone();
    assert_eq!(login.args.len(), 2);
    assert_eq!(login.args[0].position, 0);
    assert_eq!(login.args[0].source, ArgSource::Request);
    assert_eq!(login.args[1].position, 1);
    assert_eq!(login.args[1].source, ArgSource::Response);
}

#[test]
fn explicit_bindings_replace_the_default() {
    let mut controllers = Controllers::new("v1");
    let mut meta = ControllerMeta::new("Files");
    meta.method("upload")
        .post("/")
        .raw_body(0)
        .header(1, "content-type")
        .inject(2, "user")
        .handler(noop);
    controllers.register(meta);

    let upload = controllers.get("Files").unwrap().method("upload").unwrap().clone();
    assert!(upload.raw_body);
    let sources: Vec<&ArgSource> = upload.args.iter().map(|b| &b.source).collect();
    assert_eq!(
        sources,
        vec![
            &ArgSource::RawBody,
            &ArgSource::Header,
            &ArgSource::Injector("user".to_string())
        ]
    );
}

#[test]
fn full_route_is_slash_normalized() {
    assert_eq!(full_route("users/", "login"), "/users/login");
    assert_eq!(full_route("/users/", "/login/"), "/users/login");
    assert_eq!(full_route("//users", "//a//b"), "/users/a/b");
    assert_eq!(full_route("", ""), "/");
    let once = full_route("users/", "login");
    assert_eq!(normalize_path(&once), once);
}

#[test]
fn root_controllers_are_not_version_namespaced() {
    let mut controllers = Controllers::new("v1");
    let mut meta = ControllerMeta::new("Status");
    meta.prefix("/status", true).versions(["v1", "v2"]);
    meta.method("ping").get("/ping").handler(noop);
    controllers.register(meta);

    let status = controllers.get("Status").unwrap();
    let ping = status.method("ping").unwrap();
    assert_eq!(ping.url(status, "v1"), "/status/ping");
    assert_eq!(ping.url(status, "v2"), "/status/ping");
    assert_eq!(ping.operation_id(status), "Status@ping");
}

#[test]
fn arg_source_from_kind() {
    assert_eq!(ArgSource::from_kind("body"), ArgSource::Body);
    assert_eq!(ArgSource::from_kind("rawBody"), ArgSource::RawBody);
    assert_eq!(ArgSource::from_kind("headers"), ArgSource::Header);
    assert_eq!(ArgSource::from_kind("params"), ArgSource::Param);
    assert_eq!(
        ArgSource::from_kind("currentUser"),
        ArgSource::Injector("currentUser".to_string())
    );
}
