use std::collections::HashMap;

use super::*;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn partial_json_fills_defaults() {
    let cfg = EngineConfig::from_json_str(
        r#"{ "raster_cache": { "cost_threshold": 2 }, "compositor": { "validation": "always" } }"#,
    )
    .unwrap();
    assert_eq!(cfg.raster_cache.cost_threshold, 2);
    assert_eq!(
        cfg.raster_cache.access_threshold,
        RasterCacheConfig::default().access_threshold
    );
    assert_eq!(cfg.compositor.validation, ValidationPolicy::Always);
    assert!(cfg.compositor.partial_repaint);
    assert!(!cfg.snapshot.gpu_disabled_at_startup);
    cfg.validate().unwrap();
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = EngineConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, LaminateError::Serde(_)));
}

#[test]
fn json_round_trips() {
    let cfg = EngineConfig::default();
    let s = cfg.to_json_string().unwrap();
    assert_eq!(EngineConfig::from_json_str(&s).unwrap(), cfg);
}

#[test]
fn env_overrides_apply_and_ignore_garbage() {
    let cfg = EngineConfig::default().with_overrides(vars(&[
        ("LAMINATE_RASTER_CACHE_COST_THRESHOLD", "40"),
        ("LAMINATE_RASTER_CACHE_MAX_STALENESS", "0"),
        ("LAMINATE_DAMAGE_ALIGNMENT", "abc"),
        ("LAMINATE_PARTIAL_REPAINT", "off"),
        ("LAMINATE_VALIDATION", "never"),
        ("LAMINATE_GPU_DISABLED", "1"),
    ]));
    assert_eq!(cfg.raster_cache.cost_threshold, 40);
    assert_eq!(
        cfg.raster_cache.max_staleness_frames,
        RasterCacheConfig::default().max_staleness_frames
    );
    assert_eq!(cfg.compositor.damage_alignment, 1);
    assert!(!cfg.compositor.partial_repaint);
    assert_eq!(cfg.compositor.validation, ValidationPolicy::Never);
    assert!(cfg.snapshot.gpu_disabled_at_startup);
}

#[test]
fn validate_rejects_nonsense() {
    let mut cfg = EngineConfig::default();
    cfg.raster_cache.max_staleness_frames = 0;
    assert!(matches!(cfg.validate(), Err(LaminateError::Validation(_))));

    let mut cfg = EngineConfig::default();
    cfg.compositor.damage_alignment = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = EngineConfig::from_json_file(Path::new("/nonexistent/laminate.json")).unwrap_err();
    assert!(err.to_string().contains("laminate.json"));
}
