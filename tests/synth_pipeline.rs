//! End-to-end synthesis tests: declare the items-service stack, resolve,
//! emit, and check the properties the template contract promises.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use stackform::config::SynthConfig;
use stackform::synth;
use stackform_core::{cors, ResourceKind};

fn record_positions(template: &stackform_core::Template) -> HashMap<&str, usize> {
    template
        .resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.as_str(), i))
        .collect()
}

#[test]
fn every_dependency_emits_before_its_dependents() {
    let template = synth::build_template(&SynthConfig::default()).unwrap();
    let positions = record_positions(&template);

    assert_eq!(template.resources.len(), 11);
    for record in &template.resources {
        for dep in &record.depends_on {
            assert!(
                positions[dep.as_str()] < positions[record.id.as_str()],
                "'{}' depends on '{}' but emits first",
                record.id,
                dep
            );
        }
    }

    // Leaves before dependents: the table precedes every function, the
    // functions precede the routes and the schedule rule.
    assert!(positions["items"] < positions["get-all-items"]);
    assert!(positions["get-all-items"] < positions["items-route"]);
    assert!(positions["purge-expired"] < positions["purge-schedule"]);
    assert!(positions["service-role"] < positions["get-all-items"]);
}

#[test]
fn re_synthesis_is_byte_identical() {
    let config = SynthConfig::default();

    let first = synth::render(&synth::build_template(&config).unwrap()).unwrap();
    let second = synth::render(&synth::build_template(&config).unwrap()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn function_environment_carries_resolved_table_name() {
    let template = synth::build_template(&SynthConfig::default()).unwrap();
    let positions = record_positions(&template);

    let table_name = template.resources[positions["items"]].name.clone();
    assert!(table_name.starts_with("items-service-items-"));

    for id in ["get-all-items", "get-one-item", "create-item", "delete-item"] {
        let record = &template.resources[positions[id]];
        assert_eq!(
            record.properties["environment"]["TABLE_NAME"],
            serde_json::Value::String(table_name.clone()),
            "unresolved table name in '{id}'"
        );
    }

    // No placeholder token survives emission anywhere in the document.
    let rendered = synth::render(&template).unwrap();
    assert!(!rendered.contains("${"));
}

#[test]
fn cors_routes_carry_the_fixed_options_method() {
    let template = synth::build_template(&SynthConfig::default()).unwrap();
    let positions = record_positions(&template);

    for id in ["items-route", "item-route"] {
        let record = &template.resources[positions[id]];
        let headers = record.properties["options_method"]["response_headers"]
            .as_object()
            .unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers["Access-Control-Allow-Origin"], cors::ALLOW_ORIGIN);
        assert_eq!(headers["Access-Control-Allow-Headers"], cors::ALLOW_HEADERS);
        assert_eq!(
            headers["Access-Control-Allow-Credentials"],
            cors::ALLOW_CREDENTIALS
        );
        assert_eq!(headers["Access-Control-Allow-Methods"], cors::ALLOW_METHODS);
    }
}

#[test]
fn table_grants_cover_readers_and_writers() {
    let template = synth::build_template(&SynthConfig::default()).unwrap();
    let positions = record_positions(&template);
    let table = &template.resources[positions["items"]];

    let principal_actions: HashMap<&str, &Vec<String>> = table
        .grants
        .iter()
        .map(|g| (g.principal.as_str(), &g.actions))
        .collect();

    assert!(principal_actions["get-all-items"].contains(&"table:Scan".to_string()));
    assert!(!principal_actions["get-all-items"].contains(&"table:Delete".to_string()));
    assert!(principal_actions["create-item"].contains(&"table:Put".to_string()));
    assert!(principal_actions["purge-expired"].contains(&"table:Delete".to_string()));
}

#[test]
fn synth_writes_the_template_to_the_out_dir() {
    let out_dir = tempfile::tempdir().unwrap();
    let config = SynthConfig::default();

    let template = synth::build_template(&config).unwrap();
    let path = synth::write_template(&template, out_dir.path()).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "items-service.template.json"
    );
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, synth::render(&template).unwrap());

    // A second synth run produces the identical file.
    let again = synth::build_template(&config).unwrap();
    let path2 = synth::write_template(&again, out_dir.path()).unwrap();
    assert_eq!(std::fs::read_to_string(&path2).unwrap(), written);

    // Only the template itself ends up in the out dir; the staging file used
    // for the atomic rename is gone.
    let entries: Vec<_> = std::fs::read_dir(out_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec!["items-service.template.json"]);
}

#[test]
fn self_referencing_declaration_never_reaches_disk() {
    let out_dir = tempfile::tempdir().unwrap();
    let config = SynthConfig::default();

    let mut graph = stackform::stacks::items_service(&config).unwrap();
    graph.add_reference_by_id(
        "purge-expired",
        "purge-expired",
        stackform_core::Capability::InvokeFunction,
    );
    stackform_core::resolve(&mut graph).unwrap();

    let err = stackform_core::emit(
        &graph,
        &stackform_core::EmitOptions {
            stack_name: config.stack_name.clone(),
            environment: config.environment.clone(),
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        stackform_core::ComposeError::CyclicDependency { .. }
    ));
    assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
}

#[test]
fn stack_name_scopes_physical_names() {
    let dev = synth::build_template(&SynthConfig::default()).unwrap();
    let prod = synth::build_template(&SynthConfig {
        stack_name: "items-service-prod".to_string(),
        ..SynthConfig::default()
    })
    .unwrap();

    let dev_positions = record_positions(&dev);
    let prod_positions = record_positions(&prod);
    assert_ne!(
        dev.resources[dev_positions["items"]].name,
        prod.resources[prod_positions["items"]].name
    );
}

#[test]
fn record_kinds_round_trip_through_json() {
    let template = synth::build_template(&SynthConfig::default()).unwrap();
    let rendered = synth::render(&template).unwrap();

    let parsed: stackform_core::Template = serde_json::from_str(&rendered).unwrap();
    assert_eq!(parsed, template);

    let positions = record_positions(&parsed);
    assert_eq!(
        parsed.resources[positions["items"]].kind,
        ResourceKind::Table
    );
    assert_eq!(
        parsed.resources[positions["purge-schedule"]].kind,
        ResourceKind::ScheduleRule
    );
}
