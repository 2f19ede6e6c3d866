use crate::config::Config;
use crate::store::Definitions;
use std::fmt::Write;

/// Human readable summary of a loaded config
pub fn describe_config(config: &Config, definitions: &Definitions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Loaded {} rules and {} workflows",
        definitions.rules.len(),
        definitions.workflows.len()
    );
    let _ = writeln!(out, "\nBridge config:");
    let _ = writeln!(out, "  enabled: {}", config.bridge.enabled);
    let _ = writeln!(out, "  address: {}:{}", config.bridge.host, config.bridge.port);
    let _ = writeln!(out, "  response_timeout: {:?}", config.bridge.response_timeout);
    let _ = writeln!(out, "\nSettings:");
    let _ = writeln!(out, "  alwaysShowPopup: {}", config.settings.always_show_popup);
    let _ = writeln!(out, "  reevalRules: {}", config.settings.reeval_rules);
    let _ = writeln!(out, "  jpegQuality: {}", config.settings.jpeg_quality);

    if !definitions.rules.is_empty() {
        let _ = writeln!(out, "\nRules:");
        for rule in &definitions.rules {
            let mut matchers = Vec::new();
            if let Some(url) = &rule.url {
                matchers.push(format!("url:{}", url.as_str()));
            }
            if let Some(content) = &rule.content {
                matchers.push(format!("content:{}", content.as_str()));
            }
            let _ = writeln!(
                out,
                "  {}: {} [{}] -> {} fields{}",
                rule.id,
                rule.name,
                matchers.join(", "),
                rule.fields.len(),
                if rule.autorun { " (autorun)" } else { "" }
            );
        }
    }

    if !definitions.workflows.is_empty() {
        let _ = writeln!(out, "\nWorkflows:");
        for workflow in &definitions.workflows {
            let _ = writeln!(
                out,
                "  {}: {} -> {}",
                workflow.id,
                workflow.name,
                workflow.steps.join(" → ")
            );
        }
    }

    out
}
