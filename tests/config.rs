use nsmsim::config::NsmConfig;
use nsmsim::error::Result;
use nsmsim::NextSubvolumeMethod;

const CONFIG: &str = r#"{
    "low": [0.0, 0.0, 0.0],
    "high": [1.0, 1.0, 0.5],
    "cell_size": 0.25,
    "seed": 77,
    "species": [
        { "name": "A", "diffusion": 0.01, "initial_count": 300 },
        { "name": "B", "diffusion": 0.0, "diffusing": false }
    ]
}"#;

#[test]
fn engine_from_json_config() -> Result<()> {
    let config: NsmConfig = serde_json::from_str(CONFIG).expect("config parses");
    let mut nsm = NextSubvolumeMethod::from_config(&config)?;
    assert_eq!(nsm.grid().size(), 4 * 4 * 2);
    assert_eq!(nsm.species().len(), 2);
    assert_eq!(nsm.get_diffusing_species().len(), 1);
    assert_eq!(nsm.species()[0].total_copy_number(), 300);
    assert_eq!(nsm.species()[1].total_copy_number(), 0);

    nsm.integrate(1.0)?;
    assert_eq!(nsm.species()[0].total_copy_number(), 300);

    let dump = nsm.to_string();
    assert!(dump.contains("species A"));
    assert!(dump.contains("species B"));
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let mut config: NsmConfig = serde_json::from_str(CONFIG).expect("config parses");
    config.cell_size = -1.0;
    assert!(NextSubvolumeMethod::from_config(&config).is_err());
}
