use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use shoot_config::{load_config, load_config_str, ConfigError, Connection};
use shoot_core::RenderMode;

const CONFIG: &str = r#"
version: "1.0"
defaults:
  models:
    orchestrator: gpt-4o
    collector: gpt-4o-mini
  timeouts:
    investigation: 120
    subagent: 45
  response_format: json
  pricing:
    gpt-4o: { input_per_mtok: 2.5, output_per_mtok: 10.0 }
response_schemas:
  diagnostic:
    file: schemas/diagnostic.json
    description: Diagnostic report
mcp_servers:
  kubernetes:
    command: kubernetes-mcp-server
    args: ["--kubeconfig", "${KUBECONFIG:-/etc/kube/config}"]
    env:
      KUBE_TOKEN: "${KUBE_TOKEN}"
    tools: [namespaces_list, pods_list]
  metrics:
    url: "https://${METRICS_HOST}/mcp"
    tools: [query]
    timeout_seconds: 15
subagents:
  kube:
    description: Kubernetes collector
    system_prompt_file: prompts/kube.md
    mcp_servers: [kubernetes]
  prom:
    description: Metrics collector
    system_prompt: "Query metrics for $cluster."
    model: gpt-4o
    mcp_servers: [metrics]
    allowed_tools: [mcp__metrics__query]
    max_turns: 5
assistants:
  triage:
    description: Cluster triage
    system_prompt_file: prompts/triage.md
    subagents: [kube, prom]
    response_schema: diagnostic
    max_turns: 20
    prompt_variables:
      cluster: staging
    request_variables: [cluster, namespace]
"#;

const SCHEMA: &str = r#"{
  "type": "object",
  "required": ["failure_signal", "summary"],
  "properties": {
    "failure_signal": {"type": "string"},
    "summary": {"type": "array", "items": {"type": "string"}}
  }
}"#;

fn write_tree(dir: &Path, config: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("prompts")).unwrap();
    fs::create_dir_all(dir.join("schemas")).unwrap();
    fs::write(dir.join("prompts/kube.md"), "You collect Kubernetes data.").unwrap();
    fs::write(
        dir.join("prompts/triage.md"),
        "Investigate ${cluster} in namespace $namespace.",
    )
    .unwrap();
    fs::write(dir.join("schemas/diagnostic.json"), SCHEMA).unwrap();
    let path = dir.join("config.yaml");
    fs::write(&path, config).unwrap();
    path
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn loads_complete_configuration() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), CONFIG);

    let lookup = env(&[("KUBE_TOKEN", "secret"), ("METRICS_HOST", "prom.internal")]);
    let config = load_config_str(CONFIG, dir.path(), &lookup).unwrap();

    let kubernetes = config.tool_server("kubernetes").unwrap();
    match &kubernetes.connection {
        Connection::Command { args, env, .. } => {
            assert_eq!(args[1], "/etc/kube/config");
            assert_eq!(env.get("KUBE_TOKEN").map(String::as_str), Some("secret"));
        }
        other => panic!("unexpected connection: {other:?}"),
    }
    assert_eq!(kubernetes.request_timeout, Duration::from_secs(60));

    let metrics = config.tool_server("metrics").unwrap();
    assert_eq!(
        metrics.connection,
        Connection::Endpoint {
            url: "https://prom.internal/mcp".to_string(),
            headers: Default::default(),
        }
    );
    assert_eq!(metrics.request_timeout, Duration::from_secs(15));

    let kube = config.collector("kube").unwrap();
    assert_eq!(kube.profile.model, "gpt-4o-mini");
    assert_eq!(kube.profile.budget.max_turns, 10);
    assert_eq!(kube.profile.budget.timeout, Duration::from_secs(45));
    assert_eq!(
        kube.allowed_tools,
        vec![
            "mcp__kubernetes__namespaces_list".to_string(),
            "mcp__kubernetes__pods_list".to_string()
        ]
    );
    assert_eq!(kube.profile.instructions.source(), "You collect Kubernetes data.");

    let prom = config.collector("prom").unwrap();
    assert_eq!(prom.profile.model, "gpt-4o");
    assert_eq!(prom.profile.budget.max_turns, 5);

    let triage = config.agent("triage").unwrap();
    assert_eq!(triage.profile.model, "gpt-4o");
    assert_eq!(triage.profile.budget.max_turns, 20);
    assert_eq!(triage.profile.budget.timeout, Duration::from_secs(120));
    assert_eq!(triage.collectors, vec!["kube".to_string(), "prom".to_string()]);

    let schema = config.schema_for(triage).unwrap();
    assert_eq!(schema.mode, RenderMode::Machine);
    assert_eq!(schema.required_fields(), vec!["failure_signal", "summary"]);

    assert!(config.pricing_for("gpt-4o").input_per_mtok > 0.0);
    assert_eq!(config.pricing_for("unknown").input_per_mtok, 0.0);
}

#[test]
fn unset_variable_is_reported_without_value() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), CONFIG);

    let error = load_config_str(CONFIG, dir.path(), &env(&[("METRICS_HOST", "h")])).unwrap_err();
    let errors = error.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "mcp_servers.kubernetes.env.KUBE_TOKEN");
    assert!(errors[0].message.contains("${KUBE_TOKEN}"));
}

#[test]
fn missing_files_are_collected_together() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), CONFIG);
    fs::remove_file(dir.path().join("prompts/kube.md")).unwrap();
    fs::write(dir.path().join("schemas/diagnostic.json"), "{ not json").unwrap();

    let lookup = env(&[("KUBE_TOKEN", "t"), ("METRICS_HOST", "h")]);
    let error = load_config_str(CONFIG, dir.path(), &lookup).unwrap_err();

    let paths: Vec<&str> = error.errors().iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&"response_schemas.diagnostic.file"));
    assert!(paths.contains(&"subagents.kube.system_prompt_file"));
    assert_eq!(paths.len(), 2);
}

#[test]
fn reference_and_file_errors_are_reported_together() {
    let dir = tempfile::tempdir().unwrap();
    let config = CONFIG.replace("subagents: [kube, prom]", "subagents: [kube, prom, logs]");
    write_tree(dir.path(), &config);
    fs::remove_file(dir.path().join("schemas/diagnostic.json")).unwrap();

    let lookup = env(&[("KUBE_TOKEN", "t"), ("METRICS_HOST", "h")]);
    let error = load_config_str(&config, dir.path(), &lookup).unwrap_err();

    let messages: Vec<String> = error.errors().iter().map(|e| e.to_string()).collect();
    assert!(messages.iter().any(|m| m.contains("unknown subagent 'logs'")));
    assert!(messages.iter().any(|m| m.contains("diagnostic.json")));
}

#[test]
fn schema_that_does_not_compile_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), CONFIG);
    fs::write(
        dir.path().join("schemas/diagnostic.json"),
        r#"{"type": "object", "properties": {"id": {"type": "string", "pattern": "("}}}"#,
    )
    .unwrap();

    let lookup = env(&[("KUBE_TOKEN", "t"), ("METRICS_HOST", "h")]);
    let error = load_config_str(CONFIG, dir.path(), &lookup).unwrap_err();
    assert!(error.errors()[0].message.contains("invalid JSON Schema"));
}

#[test]
fn non_mapping_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_config_str("- a\n- b\n", dir.path(), &env(&[])).unwrap_err();
    assert!(matches!(error, ConfigError::Validation(ref errors) if errors.len() == 1));
}

#[test]
fn load_config_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_config(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(error, ConfigError::FileNotFound(_)));
}

#[test]
fn load_config_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = CONFIG
        .replace("${KUBE_TOKEN}", "${SHOOT_TEST_UNSET_TOKEN:-none}")
        .replace("${METRICS_HOST}", "${SHOOT_TEST_UNSET_HOST:-localhost}");
    let path = write_tree(dir.path(), &config);

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.source_dir, dir.path());
    assert_eq!(loaded.agent_names(), vec!["triage".to_string()]);
}

#[test]
fn bundled_sample_configuration_is_valid() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
    let content = fs::read_to_string(dir.join("config.yaml")).unwrap();
    let config = load_config_str(&content, &dir, &|_: &str| None).unwrap();

    assert_eq!(
        config.agent_names(),
        vec!["kubernetes_debugger", "kubernetes_reporter"]
    );
    let debugger = config.agent("kubernetes_debugger").unwrap();
    assert_eq!(debugger.collectors.len(), 3);
    assert_eq!(
        config.schema_for(debugger).unwrap().mode,
        RenderMode::Human
    );
    let reporter = config.agent("kubernetes_reporter").unwrap();
    assert_eq!(config.schema_for(reporter).unwrap().mode, RenderMode::Machine);
    assert_eq!(reporter.profile.budget.timeout, Duration::from_secs(180));

    let management = config.collector("management_collector").unwrap();
    assert_eq!(management.allowed_tools.len(), 2);
    assert!(matches!(
        config.tool_server("prometheus").unwrap().connection,
        Connection::Endpoint { .. }
    ));
}
