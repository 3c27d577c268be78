use swarm::prelude::*;
use swarm_test::TestApp;

struct Greeter;

impl Controller for Greeter {
    fn describe(meta: &mut ControllerMeta) {
        meta.title("Greeter").prefix("/hello", false);
        meta.method("greet")
            .get("/:name")
            .title("Say hello")
            .parameter("name", json!({ "type": "string" }), "Who to greet")
            .returns(200, json!({ "type": "object" }), "A greeting")
            .param(0, "name")
            .handler(|args: Args| async move { Ok(json!({ "hello": args.str(0) })) });
    }
}

#[tokio::test]
async fn prelude_builds_a_documented_application() {
    let config = SwarmConfig::from_yaml_str(
        "swarm:\n  title: Greetings\n  default_version: v3\n",
        "test",
    )
    .unwrap();
    let swarm = Swarm::from_config(&config)
        .unwrap()
        .with(OpenApiPlugin::new())
        .controller::<Greeter>()
        .with(ErrorHandling);
    let app = TestApp::from_swarm(swarm).await;

    app.get("/v3/hello/Ada")
        .send()
        .await
        .assert_ok()
        .assert_json_path("hello", "Ada");

    app.get("/v3/swagger.json")
        .send()
        .await
        .assert_ok()
        .assert_json_path("info.title", "Greetings")
        .assert_json_path("paths./v3/hello/{name}.get.operationId", "Greeter@greet");
}
