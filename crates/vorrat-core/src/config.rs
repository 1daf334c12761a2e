use crate::app_config::{AppConfig, Environment, MatcherTuning};
use crate::brands::parse_brand_list;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("VORRAT_ENV", "development"));

    let database_url = or_default("DATABASE_URL", "sqlite://vorrat.db?mode=rwc");
    let bind_addr = parse_addr("VORRAT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("VORRAT_LOG_LEVEL", "info");
    let cache_dir = PathBuf::from(or_default("VORRAT_CACHE_DIR", "./cache"));
    let brands = parse_brand_list(&or_default("VORRAT_BRANDS", "dm,rossmann,mueller,budni"))?;

    let price_threshold_days = parse_i64("VORRAT_PRICE_THRESHOLD_DAYS", "7")?;
    let availability_threshold_days = parse_i64("VORRAT_AVAILABILITY_THRESHOLD_DAYS", "2")?;
    let stores_per_brand = parse_i64("VORRAT_STORES_PER_BRAND", "4")?;

    let http_timeout_secs = parse_u64("VORRAT_HTTP_TIMEOUT_SECS", "25")?;
    let user_agent = or_default(
        "VORRAT_USER_AGENT",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    );
    let browser_max_pages = parse_usize("VORRAT_BROWSER_MAX_PAGES", "4")?;
    let intercept_timeout_secs = parse_u64("VORRAT_INTERCEPT_TIMEOUT_SECS", "15")?;

    let matcher = MatcherTuning {
        dict_search_cutoff: parse_f64("VORRAT_DICT_SEARCH_CUTOFF", "0.7")?,
        dict_accept_score: parse_f64("VORRAT_DICT_ACCEPT_SCORE", "0.3")?,
        token_accept_ratio: parse_f64("VORRAT_TOKEN_ACCEPT_RATIO", "0.5")?,
        candidate_accept_score: parse_f64("VORRAT_CANDIDATE_ACCEPT_SCORE", "0.3")?,
    };

    validate(&matcher)?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        cache_dir,
        brands,
        price_threshold_days,
        availability_threshold_days,
        stores_per_brand,
        http_timeout_secs,
        user_agent,
        browser_max_pages,
        intercept_timeout_secs,
        matcher,
    })
}

fn validate(matcher: &MatcherTuning) -> Result<(), ConfigError> {
    let in_unit = |name: &str, value: f64| -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(ConfigError::Validation(format!(
                "{name} must be within [0, 1], got {value}"
            )))
        }
    };

    in_unit("VORRAT_DICT_SEARCH_CUTOFF", matcher.dict_search_cutoff)?;
    in_unit("VORRAT_DICT_ACCEPT_SCORE", matcher.dict_accept_score)?;
    in_unit("VORRAT_TOKEN_ACCEPT_RATIO", matcher.token_accept_ratio)?;
    in_unit(
        "VORRAT_CANDIDATE_ACCEPT_SCORE",
        matcher.candidate_accept_score,
    )
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;
    use crate::brands::Brand;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn empty_env_yields_full_defaults() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();

        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(
            cfg.brands,
            vec![Brand::Dm, Brand::Rossmann, Brand::Mueller, Brand::Budni]
        );
        assert_eq!(cfg.price_threshold_days, 7);
        assert_eq!(cfg.availability_threshold_days, 2);
        assert_eq!(cfg.stores_per_brand, 4);
        assert_eq!(cfg.http_timeout_secs, 25);
        assert_eq!(cfg.browser_max_pages, 4);
        assert_eq!(cfg.intercept_timeout_secs, 15);
    }

    #[test]
    fn matcher_thresholds_default_to_documented_constants() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();

        assert!((cfg.matcher.dict_search_cutoff - 0.7).abs() < f64::EPSILON);
        assert!((cfg.matcher.dict_accept_score - 0.3).abs() < f64::EPSILON);
        assert!((cfg.matcher.token_accept_ratio - 0.5).abs() < f64::EPSILON);
        assert!((cfg.matcher.candidate_accept_score - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn brand_list_override_restricts_fan_out() {
        let mut map = HashMap::new();
        map.insert("VORRAT_BRANDS", "dm,budni");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.brands, vec![Brand::Dm, Brand::Budni]);
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let mut map = HashMap::new();
        map.insert("VORRAT_BIND_ADDR", "not-a-socket-addr");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "VORRAT_BIND_ADDR"),
            "expected InvalidEnvVar(VORRAT_BIND_ADDR), got: {result:?}"
        );
    }

    #[test]
    fn invalid_threshold_days_is_rejected() {
        let mut map = HashMap::new();
        map.insert("VORRAT_PRICE_THRESHOLD_DAYS", "seven");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "VORRAT_PRICE_THRESHOLD_DAYS"),
            "expected InvalidEnvVar(VORRAT_PRICE_THRESHOLD_DAYS), got: {result:?}"
        );
    }

    #[test]
    fn out_of_range_matcher_threshold_is_rejected() {
        let mut map = HashMap::new();
        map.insert("VORRAT_CANDIDATE_ACCEPT_SCORE", "1.5");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn environment_parses_known_values() {
        assert_eq!(parse_environment("production"), Environment::Production);
        assert_eq!(parse_environment("test"), Environment::Test);
        assert_eq!(parse_environment("anything"), Environment::Development);
    }
}
