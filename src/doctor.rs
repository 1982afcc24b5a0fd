use std::net::SocketAddr;
use std::sync::Arc;

use stackr_agent::BitcoinNewsWorkflow;
use stackr_core::config::AppConfig;
use stackr_core::types::Provider;
use stackr_llm::selection::ModelSelector;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

impl CheckResult {
    fn ok(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(label: &str, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Print every check and return how many failed.
pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = collect_checks(config);

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn collect_checks(config: &AppConfig) -> Vec<CheckResult> {
    let mut checks = vec![
        check_api_keys(config),
        check_server(config),
        check_thresholds(config),
    ];

    // Catalog problems make the remaining checks meaningless
    match ModelSelector::from_config(config) {
        Ok(selector) => {
            let selector = Arc::new(selector);
            checks.push(check_catalog(config, &selector));
            checks.push(check_workflow(config, selector));
        }
        Err(e) => checks.push(CheckResult::fail("Model catalog", e.to_string())),
    }
    checks
}

fn check_api_keys(config: &AppConfig) -> CheckResult {
    let available = config.available_providers();
    if available.is_empty() {
        let vars: Vec<&str> = Provider::ALL.iter().map(|p| p.api_key_env()).collect();
        return CheckResult::fail(
            "API keys",
            format!("No provider has an API key (set one of {})", vars.join(", ")),
        );
    }
    let names: Vec<String> = available
        .iter()
        .filter_map(|p| config.provider(*p))
        .map(|c| format!("{} ({})", c.provider, c.model_id))
        .collect();
    CheckResult::ok("API keys", names.join(", "))
}

fn check_server(config: &AppConfig) -> CheckResult {
    match config.server.bind.parse::<SocketAddr>() {
        Ok(addr) => CheckResult::ok("Server", format!("binds {}", addr)),
        Err(e) => CheckResult::fail(
            "Server",
            format!("invalid bind address '{}': {}", config.server.bind, e),
        ),
    }
}

fn check_thresholds(config: &AppConfig) -> CheckResult {
    let t = &config.selection.thresholds;
    let ordered = t.budget <= t.standard
        && t.standard <= t.premium
        && t.ultra.map_or(true, |u| t.premium <= u);
    let detail = format!(
        "budget {} / standard {} / premium {} / ultra {}",
        t.budget,
        t.standard,
        t.premium,
        t.ultra.map_or_else(|| "none".to_string(), |u| u.to_string())
    );
    if ordered {
        CheckResult::ok("Budget tiers", detail)
    } else {
        CheckResult::fail("Budget tiers", format!("{} (ceilings must not decrease)", detail))
    }
}

fn check_catalog(config: &AppConfig, selector: &ModelSelector) -> CheckResult {
    let catalog = selector.catalog();
    let unknown: Vec<String> = config
        .providers
        .iter()
        .filter(|p| catalog.find(p.provider, &p.model_id).is_none())
        .map(|p| format!("{}/{}", p.provider, p.model_id))
        .collect();

    if unknown.is_empty() {
        CheckResult::ok(
            "Model catalog",
            format!("version {} ({} models)", catalog.version, catalog.len()),
        )
    } else {
        CheckResult::fail(
            "Model catalog",
            format!("configured models not in catalog: {}", unknown.join(", ")),
        )
    }
}

fn check_workflow(config: &AppConfig, selector: Arc<ModelSelector>) -> CheckResult {
    let client = Arc::new(stackr_llm::OpenAiCompatibleClient::new());
    match BitcoinNewsWorkflow::new(config, client, selector) {
        Ok(workflow) => {
            let unhandled = workflow.runner().unhandled_nodes();
            if unhandled.is_empty() {
                CheckResult::ok(
                    "Bitcoin news workflow",
                    format!("ready ({} steps)", workflow.runner().graph().len()),
                )
            } else {
                CheckResult::fail(
                    "Bitcoin news workflow",
                    format!("steps without handlers: {}", unhandled.join(", ")),
                )
            }
        }
        Err(e) => CheckResult::fail("Bitcoin news workflow", e.to_string()),
    }
}
