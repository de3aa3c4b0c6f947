use kioskface_core::{ConfigError, KioskConfig};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_VAR: &str = "KIOSKFACE_CONFIG";

/// Load configuration: defaults, then the TOML file (explicit `path`, or
/// `KIOSKFACE_CONFIG`), then `KIOSKFACE_*` environment overrides.
pub fn load(path: Option<&Path>) -> Result<KioskConfig, ConfigError> {
    load_with(path, |key| std::env::var(key).ok())
}

fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<KioskConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = path
        .map(Path::to_path_buf)
        .or_else(|| lookup(CONFIG_PATH_VAR).map(PathBuf::from));

    let mut config = match &file {
        Some(file) => {
            tracing::info!(path = %file.display(), "loading kiosk config");
            KioskConfig::from_toml_file(file)?
        }
        None => KioskConfig::default(),
    };

    apply_env_overrides(&mut config, &lookup);
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut KioskConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    config.high_confidence_threshold = env_or(
        lookup,
        "KIOSKFACE_HIGH_CONFIDENCE_THRESHOLD",
        config.high_confidence_threshold,
    );
    config.low_confidence_threshold = env_or(
        lookup,
        "KIOSKFACE_LOW_CONFIDENCE_THRESHOLD",
        config.low_confidence_threshold,
    );
    config.recency_bonus = env_or(lookup, "KIOSKFACE_RECENCY_BONUS", config.recency_bonus);
    config.detection_interval_ms = env_or(
        lookup,
        "KIOSKFACE_DETECTION_INTERVAL_MS",
        config.detection_interval_ms,
    );
    config.no_face_timeout_ms =
        env_or(lookup, "KIOSKFACE_NO_FACE_TIMEOUT_MS", config.no_face_timeout_ms);
    config.capture_zone_fraction = env_or(
        lookup,
        "KIOSKFACE_CAPTURE_ZONE_FRACTION",
        config.capture_zone_fraction,
    );
    config.min_face_size_ratio =
        env_or(lookup, "KIOSKFACE_MIN_FACE_SIZE_RATIO", config.min_face_size_ratio);
    config.min_face_area_px = env_or(lookup, "KIOSKFACE_MIN_FACE_AREA_PX", config.min_face_area_px);
    config.max_faces_warning =
        env_or(lookup, "KIOSKFACE_MAX_FACES_WARNING", config.max_faces_warning);

    let enrollment = &mut config.enrollment;
    enrollment.min_width = env_or(lookup, "KIOSKFACE_ENROLL_MIN_WIDTH", enrollment.min_width);
    enrollment.min_height = env_or(lookup, "KIOSKFACE_ENROLL_MIN_HEIGHT", enrollment.min_height);
    enrollment.min_confidence =
        env_or(lookup, "KIOSKFACE_ENROLL_MIN_CONFIDENCE", enrollment.min_confidence);
    enrollment.min_face_size =
        env_or(lookup, "KIOSKFACE_ENROLL_MIN_FACE_SIZE", enrollment.min_face_size);
}

/// Parsed value of `key`, or `default` when unset. Unparsable values are
/// logged and ignored.
fn env_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable config override");
            default
        }),
        None => default,
    }
}
