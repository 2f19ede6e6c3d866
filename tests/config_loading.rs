use anyhow::Result;
use formfill::config::{Config, load_definitions};
use formfill::rule::{Field, HookSpec, UrlPart};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_demo_config() -> Result<()> {
    let config = Config::from_file(Path::new("demos/config.yaml"))?;
    assert_eq!(config.bridge.port, 9990);
    assert_eq!(config.bridge.response_timeout, Duration::from_millis(1500));
    assert_eq!(config.recheck_interval, Duration::from_secs(2));
    assert_eq!(config.settings.jpeg_quality, 60);

    let definitions = config.definitions()?;
    assert_eq!(definitions.rules.len(), 4);
    assert_eq!(definitions.workflows.len(), 1);

    let login = &definitions.rules[1];
    assert_eq!(login.id, "1-2");
    assert!(login.autorun);
    assert!(login.matches_url("https://example.com/login?next=/"));

    let shipping = &definitions.rules[2];
    assert_eq!(
        shipping.before,
        vec![
            HookSpec::Grab {
                grab: "h1.title".to_string()
            },
            HookSpec::UrlPart { url: UrlPart::Host },
        ]
    );
    assert_eq!(shipping.fields[1], Field::import("SharedAddress"));

    let workflow = &definitions.workflows[0];
    assert_eq!(workflow.steps, vec!["Login", "Shipping", "Submit"]);
    assert!(workflow.flags.screenshot);
    Ok(())
}

#[test]
fn test_invalid_yaml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "rules: [").unwrap();

    let result = Config::from_file(temp_file.path());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("parse"));
}

#[test]
fn test_invalid_regex() -> Result<()> {
    let yaml_content = r#"
rules:
  - name: Broken
    url: "[invalid"
    fields: []
"#;

    let mut temp_file = NamedTempFile::new()?;
    write!(temp_file, "{}", yaml_content)?;

    let result = load_definitions(temp_file.path());
    assert!(result.is_err());
    let error_msg = format!("{:#}", result.unwrap_err());
    assert!(error_msg.contains("Invalid url pattern in rule 'Broken'"));
    Ok(())
}

#[test]
fn test_duplicate_rule_names() -> Result<()> {
    let yaml_content = r#"
rules:
  - name: Login
    fields: []
  - name: Login
    fields: []
"#;

    let mut temp_file = NamedTempFile::new()?;
    write!(temp_file, "{}", yaml_content)?;

    let result = load_definitions(temp_file.path());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Duplicate rule name: Login"));
    Ok(())
}

#[test]
fn test_file_not_found() {
    let result = Config::from_file(Path::new("does/not/exist.yaml"));
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to read config file"));
}
