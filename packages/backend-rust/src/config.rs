use std::path::PathBuf;
use std::str::FromStr;

use bkt_algo::{EmConfig, ParameterSet, SelectionStrategy, UpdateRule};

use crate::logging::LogConfig;

#[derive(Debug, Clone)]
pub struct RefitConfig {
    /// Minimum number of non-empty sequences before a refit is attempted
    pub min_sequences: usize,
    /// Six-field cron expression (sec min hour day month weekday)
    pub schedule: String,
    pub worker_enabled: bool,
    pub fit_on_startup: bool,
}

impl Default for RefitConfig {
    fn default() -> Self {
        Self {
            min_sequences: 1,
            schedule: "0 0 3 * * *".to_string(),
            worker_enabled: true,
            fit_on_startup: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log: LogConfig,
    /// Parameters of generation 0, used until the first refit
    pub default_params: ParameterSet,
    pub update_rule: UpdateRule,
    pub selection: SelectionStrategy,
    pub em: EmConfig,
    pub refit: RefitConfig,
    pub seed_submissions_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            default_params: ParameterSet::default(),
            update_rule: UpdateRule::Standard,
            selection: SelectionStrategy::LowestMastery,
            em: EmConfig::default(),
            refit: RefitConfig::default(),
            seed_submissions_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base = defaults.default_params;
        let default_params = ParameterSet::new(
            env_parse("BKT_DEFAULT_PRIOR", base.prior()),
            env_parse("BKT_DEFAULT_TRANSIT", base.transit()),
            env_parse("BKT_DEFAULT_SLIP", base.slip()),
            env_parse("BKT_DEFAULT_GUESS", base.guess()),
        );

        let update_rule = std::env::var("BKT_UPDATE_RULE")
            .ok()
            .and_then(|v| UpdateRule::from_str(&v))
            .unwrap_or(defaults.update_rule);

        let selection = std::env::var("ADAPTIVE_SELECTION")
            .ok()
            .and_then(|v| SelectionStrategy::from_str(&v))
            .unwrap_or(defaults.selection);

        let em = EmConfig {
            max_iterations: env_parse("EM_MAX_ITERATIONS", defaults.em.max_iterations),
            tolerance: env_parse("EM_TOLERANCE", defaults.em.tolerance).max(0.0),
            parallel: env_flag("EM_PARALLEL", defaults.em.parallel),
        };

        let refit = RefitConfig {
            min_sequences: env_parse("REFIT_MIN_SEQUENCES", defaults.refit.min_sequences).max(1),
            schedule: std::env::var("REFIT_SCHEDULE").unwrap_or(defaults.refit.schedule),
            worker_enabled: env_flag("ENABLE_REFIT_WORKER", defaults.refit.worker_enabled),
            fit_on_startup: env_flag("FIT_ON_STARTUP", defaults.refit.fit_on_startup),
        };

        let seed_submissions_path = std::env::var("SEED_SUBMISSIONS_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            log: LogConfig::from_env(),
            default_params,
            update_rule,
            selection,
            em,
            refit,
            seed_submissions_path,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| match v.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        })
        .unwrap_or(default)
}
