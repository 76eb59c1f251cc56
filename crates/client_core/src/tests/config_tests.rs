use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_yields_defaults() {
    let settings = load_settings_from(Path::new("/nonexistent/dashboard.toml"), no_env);
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn file_values_are_overridden_by_env() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("dashboard_settings_{suffix}.toml"));
    fs::write(
        &path,
        "api_base_url = \"http://file.example/api\"\nrequest_timeout_seconds = 5\napi_token = \"file-token\"\n",
    )
    .expect("write settings");

    let vars: HashMap<&str, &str> = HashMap::from([
        ("APP__API_BASE_URL", "https://env.example/ecs-deploy/api/v1"),
        ("APP__REQUEST_TIMEOUT_SECONDS", "not-a-number"),
    ]);
    let settings = load_settings_from(&path, |name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(
        settings.api_base_url,
        "https://env.example/ecs-deploy/api/v1"
    );
    assert_eq!(settings.api_token.as_deref(), Some("file-token"));
    assert_eq!(settings.request_timeout_seconds, 5);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn blank_token_is_treated_as_absent() {
    let settings = load_settings_from(Path::new("/nonexistent/dashboard.toml"), |name| {
        (name == "DASHBOARD_TOKEN").then(|| "   ".to_string())
    });
    assert_eq!(settings.api_token, None);
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(parse_base_url("").is_err());
    assert!(parse_base_url("ftp://example.com/api").is_err());
    assert!(parse_base_url("not a url").is_err());
    assert!(parse_base_url("mailto:ops@example.com").is_err());
    assert_eq!(
        parse_base_url(" http://127.0.0.1:8080/ecs-deploy/api/v1 ")
            .expect("valid")
            .path(),
        "/ecs-deploy/api/v1"
    );
}
