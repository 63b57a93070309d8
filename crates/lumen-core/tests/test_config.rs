use lumen_core::pipeline::config::BurstConfig;
use lumen_core::pipeline::BurstPipeline;

#[test]
fn test_defaults_are_valid() {
    let config = BurstConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.alignment.tile_size, 32);
    assert_eq!(config.alignment.search_radius, 8);
    assert_eq!(config.alignment.pyramid_levels, 4);
    assert_eq!(config.flow.window_size, 15);
    assert_eq!(config.flow.max_iterations, 10);
    assert_eq!(config.merge.trim_ratio, 0.2);
    assert_eq!(config.merge.huber_delta, 1.0);
    assert_eq!(config.mfsr.scale_factor, 2);
    assert_eq!(config.tiled.tile_width, 256);
    assert_eq!(config.tiled.overlap, 32);
    assert_eq!(config.tiled.fallback_motion_px, 50.0);
}

#[test]
fn test_bounds_are_enforced() {
    let violations: Vec<fn(&mut BurstConfig)> = vec![
        |c| c.alignment.tile_size = 6,
        |c| c.alignment.tile_size = 15,
        |c| c.alignment.search_radius = 0,
        |c| c.alignment.pyramid_levels = 0,
        |c| c.alignment.pyramid_levels = 7,
        |c| c.flow.window_size = 14,
        |c| c.flow.window_size = 1,
        |c| c.flow.max_iterations = 0,
        |c| c.merge.trim_ratio = 0.5,
        |c| c.merge.wiener_window = 4,
        |c| c.mfsr.scale_factor = 1,
        |c| c.mfsr.scale_factor = 5,
        |c| c.tiled.overlap = 33,
        |c| c.tiled.tile_width = 32,
    ];

    for (i, violate) in violations.iter().enumerate() {
        let mut config = BurstConfig::default();
        violate(&mut config);
        assert!(config.validate().is_err(), "violation {i} accepted");
    }
}

#[test]
fn test_pipeline_rejects_invalid_config() {
    let mut config = BurstConfig::default();
    config.mfsr.scale_factor = 9;
    assert!(BurstPipeline::new(config).is_err());
}

#[test]
fn test_configure_keeps_previous_on_error() {
    let mut pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();

    let mut bad = BurstConfig::default();
    bad.alignment.search_radius = 0;
    assert!(pipeline.configure(bad).is_err());
    assert_eq!(pipeline.config().alignment.search_radius, 8);
}

#[test]
fn test_toml_round_trip() {
    let config = BurstConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: BurstConfig = toml::from_str(&text).unwrap();

    assert!(parsed.validate().is_ok());
    assert_eq!(parsed.alignment.tile_size, config.alignment.tile_size);
    assert_eq!(parsed.tiled.robustness, config.tiled.robustness);
    assert_eq!(parsed.merge.method, config.merge.method);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let text = r#"
        [mfsr]
        scale_factor = 4

        [tiled]
        overlap = 16
    "#;
    let config: BurstConfig = toml::from_str(text).unwrap();

    assert_eq!(config.mfsr.scale_factor, 4);
    assert_eq!(config.tiled.overlap, 16);
    assert_eq!(config.alignment.tile_size, 32);
    assert_eq!(config.flow.window_size, 15);
    assert!(config.validate().is_ok());
}
