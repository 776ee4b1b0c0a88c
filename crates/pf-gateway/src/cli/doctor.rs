use pf_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("phaseforge doctor");
    println!("=================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_workflow_catalog(config, &mut all_passed);
    check_store(config, &mut all_passed).await;
    check_llm_provider(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_workflow_catalog(config: &Config, all_passed: &mut bool) {
    let path = &config.workflow.definition_path;
    match pf_catalog::Catalog::load(path) {
        Ok(catalog) => {
            print_check(
                "Workflow catalog loads",
                true,
                format!("{} ({} phase(s))", path.display(), catalog.all_phases().len()),
            );
        }
        Err(e) => {
            print_check("Workflow catalog loads", false, format!("{path}: {e}", path = path.display()));
            *all_passed = false;
        }
    }
}

async fn check_store(config: &Config, all_passed: &mut bool) {
    match pf_store::SessionStore::open(&config.store.database_url).await {
        Ok(_) => {
            print_check(
                "Session store opens",
                true,
                config.store.database_url.display().to_string(),
            );
        }
        Err(e) => {
            print_check("Session store opens", false, e.to_string());
            *all_passed = false;
        }
    }
}

fn check_llm_provider(config: &Config, all_passed: &mut bool) {
    let provider = &config.llm.ai_provider;
    let ok = provider == "mock" || config.llm.base_url.is_some();
    print_check(
        "LLM provider configured",
        ok,
        if ok {
            format!("{provider} / {}", config.llm.ai_model)
        } else {
            format!("{provider} has no base_url configured")
        },
    );
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
