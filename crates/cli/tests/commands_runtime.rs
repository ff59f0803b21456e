use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use tenderdesk_cli::commands::{analyze, config, doctor, migrate, seed};

const MEMORY_DB: (&str, &str) = ("TENDERDESK_DATABASE_URL", "sqlite::memory:");
const UNCONFIGURED_PROVIDER: (&str, &str) = ("TENDERDESK_LLM_PROVIDER", "openai");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[MEMORY_DB], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("TENDERDESK_DATABASE_URL", "postgres://localhost/tenders")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_catalog_and_demo_tenders() {
    with_env(&[MEMORY_DB], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("demo dataset loaded: 8 catalog products"));
        for id in ["TND-DEMO-001", "TND-DEMO-002", "TND-DEMO-003"] {
            assert!(message.contains(&format!("  - {id}: seeded")), "missing {id}");
        }
    });
}

#[test]
fn seed_is_idempotent_against_a_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("tenders.db").display());

    with_env(&[("TENDERDESK_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let message = parse_payload(&second.output)["message"].as_str().unwrap_or("").to_string();
        assert!(message.contains("  - TND-DEMO-001: already present, left as is"));
        assert!(!message.contains(": seeded"));
    });
}

#[test]
fn config_reports_sources_and_redacts_the_api_key() {
    with_env(
        &[MEMORY_DB, UNCONFIGURED_PROVIDER, ("TENDERDESK_LLM_API_KEY", "sk-live-secret-value")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains(
                "- database.url = sqlite::memory: (source: env (TENDERDESK_DATABASE_URL))"
            ));
            assert!(message.contains("- llm.api_key = sk-*** (source: env (TENDERDESK_LLM_API_KEY))"));
            assert!(message.contains("- server.port = 8080 (source: default)"));
            assert!(!message.contains("secret-value"));
        },
    );
}

#[test]
fn doctor_flags_missing_provider_key_and_empty_catalog() {
    with_env(&[MEMORY_DB, UNCONFIGURED_PROVIDER], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        let status_of = |name: &str| {
            report["checks"]
                .as_array()
                .and_then(|checks| checks.iter().find(|check| check["name"] == name))
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("completion_provider"), "fail");
        assert_eq!(status_of("database_connectivity"), "pass");
        assert_eq!(status_of("catalog_readiness"), "fail");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("TENDERDESK_SERVER_PORT", "not-a-port")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] database_connectivity:"));
    });
}

#[test]
fn analyze_reports_missing_file_as_input_failure() {
    with_env(&[MEMORY_DB], || {
        let result = analyze::run(std::path::Path::new("/nonexistent/tender.txt"), None);
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "analyze");
        assert_eq!(payload["error_class"], "input");
    });
}

#[test]
fn analyze_surfaces_the_failing_stage_when_no_provider_is_configured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("tender.txt");
    fs::write(
        &file,
        "Supply of 11kV XLPE cable. Conductor: Aluminum. Armoring: SWA. Quantity: 5000 meters",
    )
    .expect("write tender");

    with_env(&[MEMORY_DB, UNCONFIGURED_PROVIDER], || {
        let result = analyze::run(&file, Some("TND-CLI-1".to_string()));
        assert_eq!(result.exit_code, 9);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "analyze");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "pipeline");
        assert!(
            payload["message"].as_str().unwrap_or("").starts_with("Sales Agent failed:"),
            "unexpected message: {}",
            payload["message"]
        );
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TENDERDESK_DATABASE_URL",
        "TENDERDESK_DATABASE_MAX_CONNECTIONS",
        "TENDERDESK_DATABASE_TIMEOUT_SECS",
        "TENDERDESK_LLM_PROVIDER",
        "TENDERDESK_LLM_API_KEY",
        "TENDERDESK_LLM_BASE_URL",
        "TENDERDESK_LLM_MODEL",
        "TENDERDESK_LLM_TIMEOUT_SECS",
        "TENDERDESK_LLM_MAX_RETRIES",
        "TENDERDESK_LLM_RETRY_BASE_DELAY_MS",
        "TENDERDESK_SERVER_BIND_ADDRESS",
        "TENDERDESK_SERVER_PORT",
        "TENDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TENDERDESK_PIPELINE_COMPATIBILITY_THRESHOLD",
        "TENDERDESK_PIPELINE_DEFAULT_QUANTITY",
        "TENDERDESK_PIPELINE_DEFAULT_SERVICES",
        "TENDERDESK_PIPELINE_VOLUME_DISCOUNTS",
        "TENDERDESK_PIPELINE_RECOMMENDED_MARGIN",
        "TENDERDESK_LOGGING_LEVEL",
        "TENDERDESK_LOGGING_FORMAT",
        "TENDERDESK_LOG_LEVEL",
        "TENDERDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
