//! End-to-end runs of the service pipeline through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tower::ServiceExt;
use waymark_core::{
    AliasMode, InputMap, InvocationArgs, JsonSchemaValidator, Principal, StaticPolicies,
    ServiceScope, Verb, DEFAULT_MODULE,
};
use waymark_server::service::{
    build_service_pipeline, create_link, LinkOptions, LinkSpecs, LinkTarget, ModuleContext,
    RunOptions, Runner, RunnerConfig, ServiceCall, ServiceDefinition, ServiceRegistry,
    ServiceRoute, ServiceRouter,
};

fn runner_with(registry: ServiceRegistry, context: ModuleContext) -> Runner {
    Runner::new(
        Arc::new(registry),
        Arc::new(context),
        Arc::new(JsonSchemaValidator),
        Arc::new(RunnerConfig::default()),
    )
}

fn runner() -> Runner {
    runner_with(ServiceRegistry::new(), ModuleContext::new())
}

fn signed_in() -> InvocationArgs {
    InvocationArgs::default().authenticated(Principal::new("u-1"))
}

fn sample_policy_service() -> ServiceDefinition {
    ServiceDefinition::new("sample", |b| {
        b.define_rule(|rule| {
            Box::pin(async move {
                rule.allow_policy("SAMPLE_POLICY");
                Ok(())
            })
        });
        b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({"ok": true}), None)) }));
    })
}

#[tokio::test]
async fn missing_required_field_is_a_400_listing_the_key() {
    let def = ServiceDefinition::new("signup", |b| {
        b.define_validator(json!({
            "type": "object",
            "properties": { "userName": { "type": "string" } },
            "required": ["userName"]
        }));
        b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({}), None)) }));
    });

    let stat = runner()
        .execute(&def, InvocationArgs::default(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(stat.response_code, Some(400));
    let response = stat.response.unwrap();
    assert_eq!(response["validationErrors"][0]["key"], "userName");
    assert_eq!(response["message"], response["validationErrors"][0]["message"]);
}

#[tokio::test]
async fn every_violation_is_reported() {
    let def = ServiceDefinition::new("signup", |b| {
        b.define_validator(json!({
            "type": "object",
            "properties": { "age": { "type": "integer" } },
            "required": ["userName", "email"]
        }));
        b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({}), None)) }));
    });

    let args = InvocationArgs::default().with_input("age", json!("old"));
    let stat = runner().execute(&def, args, RunOptions::default()).await.unwrap();

    assert_eq!(stat.validation_errors.len(), 3);
    let keys: Vec<_> = stat.validation_errors.iter().map(|i| i.key.as_str()).collect();
    assert!(keys.contains(&"userName"));
    assert!(keys.contains(&"email"));
    assert!(keys.contains(&"age"));
}

#[tokio::test]
async fn policy_rule_maps_callers_to_401_403_200() {
    let runner = runner();
    let def = sample_policy_service();

    let anonymous = runner
        .execute(&def, InvocationArgs::default(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(anonymous.response_code, Some(401));
    assert_eq!(anonymous.response.unwrap()["message"], "Your request is unauthorized");

    let without = runner
        .execute(&def, signed_in(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(without.response_code, Some(403));
    assert_eq!(without.response.unwrap()["message"], "Access forbidden");

    let with = runner
        .execute(&def, signed_in().with_policies(["SAMPLE_POLICY"]), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(with.response_code, Some(200));
}

#[tokio::test]
async fn hello_world_success_envelope() {
    let def = ServiceDefinition::new("hello", |b| {
        b.define_logic(|ctx| {
            Box::pin(async move {
                Ok(ctx.success(json!({"message": "Hello World"}), Some(json!([1, 2, 3]))))
            })
        });
    });

    let stat = runner()
        .execute(&def, InvocationArgs::default(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(stat.response_code, Some(200));
    let response = stat.response.unwrap();
    assert_eq!(response["type"], "success");
    assert_eq!(response["meta"]["message"], "Hello World");
    assert_eq!(response["data"], json!([1, 2, 3]));
}

#[tokio::test]
async fn capabilities_link_only_reachable_services() {
    let registry = ServiceRegistry::new();
    registry.register(None, sample_policy_service(), [ServiceRoute::rest(Verb::Get, "/sample")]);
    registry.register(
        None,
        ServiceDefinition::new("admin_panel", |b| {
            b.define_rule(|rule| {
                Box::pin(async move {
                    rule.allow_policy("ADMIN");
                    Ok(())
                })
            });
            b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({}), None)) }));
        }),
        [ServiceRoute::rest(Verb::Post, "/admin")],
    );
    let probes = Arc::new(AtomicUsize::new(0));
    let home = ServiceDefinition::new("home", {
        let probes = Arc::clone(&probes);
        move |b| {
            let probes = Arc::clone(&probes);
            b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({"page": "home"}), None)) }));
            b.define_capabilities(move |cap| {
                probes.fetch_add(1, Ordering::SeqCst);
                cap.attach_links(
                    LinkTarget::Result,
                    vec![
                        cap.create_link("sample", "sample", LinkOptions::default()),
                        cap.create_link("admin", "admin_panel", LinkOptions::default()),
                    ],
                );
                Box::pin(async { Ok(()) })
            });
        }
    });
    let runner = runner_with(registry, ModuleContext::new());
    let options = RunOptions {
        scope: ServiceScope::new(DEFAULT_MODULE, AliasMode::Rest),
        ..RunOptions::default()
    };

    let stat = runner
        .execute(&home, signed_in().with_policies(["SAMPLE_POLICY"]), options)
        .await
        .unwrap();

    assert_eq!(stat.response_code, Some(200));
    let links = stat.result.links.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].rel, "sample");
    assert_eq!(links[0].href, "/sample");
    assert_eq!(links[0].verb, Verb::Get);
    assert_eq!(stat.response.unwrap()["links"][0]["verb"], "GET");
    assert_eq!(probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn per_item_links_on_listed_data() {
    let registry = ServiceRegistry::new();
    registry.register(
        None,
        ServiceDefinition::new("get_user", |b| {
            b.define_validator(json!({"required": ["id"]}));
            b.define_logic(|_| Box::pin(async { Err(anyhow::anyhow!("unreachable in probes")) }));
        }),
        [ServiceRoute::rest(Verb::Get, "/users/:id")],
    );
    let list = ServiceDefinition::new("list_users", |b| {
        b.define_logic(|ctx| {
            Box::pin(async move { Ok(ctx.success(json!({}), Some(json!([{"id": 1}, {"id": 2}])))) })
        });
        b.define_capabilities(|cap| {
            cap.attach_links(
                LinkTarget::data(),
                LinkSpecs::per_item(|item| {
                    let mut input = InputMap::new();
                    input.insert("id".into(), item["id"].clone());
                    vec![create_link("self", "get_user", LinkOptions::with_input(input))]
                }),
            );
            Box::pin(async { Ok(()) })
        });
    });
    let runner = runner_with(registry, ModuleContext::new());
    let options = RunOptions {
        scope: ServiceScope::new(DEFAULT_MODULE, AliasMode::Rest),
        ..RunOptions::default()
    };

    let stat = runner
        .execute(&list, InvocationArgs::default(), options)
        .await
        .unwrap();

    let data = stat.result.data.unwrap();
    assert_eq!(data[0]["links"][0]["href"], "/users/1");
    assert_eq!(data[1]["links"][0]["href"], "/users/2");
}

#[tokio::test]
async fn unresolvable_link_becomes_a_500() {
    let def = ServiceDefinition::new("dangling", |b| {
        b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({}), None)) }));
        b.define_capabilities(|cap| {
            cap.attach_links(
                LinkTarget::Result,
                vec![create_link("gone", "missing_service", LinkOptions::default())],
            );
            Box::pin(async { Ok(()) })
        });
    });

    let stat = runner()
        .execute(&def, InvocationArgs::default(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(stat.response_code, Some(500));
    assert!(stat.response.unwrap()["message"]
        .as_str()
        .unwrap()
        .contains("missing_service"));
}

#[tokio::test]
async fn public_services_serve_anonymous_callers() {
    let def = ServiceDefinition::new("public", |b| {
        b.define_logic(|ctx| Box::pin(async move { Ok(ctx.error_with_code("nothing here", 404)) }));
    });

    let stat = runner()
        .execute(&def, InvocationArgs::default(), RunOptions::default())
        .await
        .unwrap();
    assert!(stat.allowed);
    assert_eq!(stat.response_code, Some(404));
    assert_eq!(stat.response.unwrap()["message"], "nothing here");
}

#[tokio::test]
async fn extractor_grants_are_ordered_and_additive() {
    let context = ModuleContext::new();
    context.register_policy_extractor(DEFAULT_MODULE, "first", StaticPolicies(vec!["P1".into()]));
    context.register_policy_extractor(DEFAULT_MODULE, "second", StaticPolicies(vec!["P2".into()]));
    context.register_policy_extractor(DEFAULT_MODULE, "none", StaticPolicies(Vec::new()));
    let registry = ServiceRegistry::new();
    registry.register(
        None,
        ServiceDefinition::new("both", |b| {
            b.define_rule(|rule| {
                Box::pin(async move {
                    if rule.args().policies == ["P1", "P2"] {
                        rule.allow();
                    }
                    Ok(())
                })
            });
            b.define_logic(|ctx| Box::pin(async move { Ok(ctx.success(json!({}), None)) }));
        }),
        Vec::new(),
    );
    let runner = Arc::new(runner_with(registry, context));
    let pipeline = build_service_pipeline(ServiceRouter::new(Arc::clone(&runner)), runner.config());

    let call = ServiceCall::new("both", signed_in()).with_policy_extractors(["first", "none", "second"]);
    let stat = pipeline.clone().oneshot(call).await.unwrap();
    assert_eq!(stat.response_code, Some(200));

    let call = ServiceCall::new("both", signed_in()).with_policy_extractors(["second", "first"]);
    let stat = pipeline.oneshot(call).await.unwrap();
    assert_eq!(stat.response_code, Some(403));
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let def = ServiceDefinition::new("pure", |b| {
        b.define_pre("double", |args| {
            Box::pin(async move {
                let n = args.input.get("n").and_then(serde_json::Value::as_i64).unwrap_or(0);
                Ok(json!(n * 2))
            })
        });
        b.define_logic(|ctx| {
            Box::pin(async move {
                let double = ctx.input("double").cloned().unwrap_or_default();
                Ok(ctx.success(json!({ "double": double }), None))
            })
        });
    });
    let runner = runner();
    let args = InvocationArgs::default().with_input("n", json!(21));

    let first = runner.execute(&def, args.clone(), RunOptions::default()).await.unwrap();
    let second = runner.execute(&def, args, RunOptions::default()).await.unwrap();

    assert_eq!(first.response_code, second.response_code);
    assert_eq!(first.response, second.response);
    assert_eq!(first.response.unwrap()["meta"]["double"], 42);
}
