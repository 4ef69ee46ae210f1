pub mod catalog;

use crate::logic::PlayPlan;
use catalog::catalog_scenarios;

/// A named play plan the CLI can select.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub plan: PlayPlan,
}

impl TestScenario {
    #[must_use]
    pub const fn new(key: &'static str, name: &'static str, plan: PlayPlan) -> Self {
        Self { key, name, plan }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let wanted = name.to_lowercase();
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.key == wanted || scenario.name.to_lowercase() == wanted)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog_scenarios()
        .into_iter()
        .map(|scenario| (scenario.key, scenario.name))
        .collect()
}

/// Keys run by `--scenarios all`.
pub fn all_scenario_keys() -> Vec<String> {
    catalog_scenarios()
        .into_iter()
        .map(|scenario| scenario.key.to_string())
        .collect()
}
