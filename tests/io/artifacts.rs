extern crate ekf_derivation;

use ekf_derivation::io::{ConfigRepr, DerivationConfig};
use ekf_derivation::observation::Sensor;
use ekf_derivation::{DerivationError, DerivationProcess};
use std::fs;
use std::path::{Path, PathBuf};

use crate::init_logger;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    dir
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

fn read(dir: &Path, artifact: &str) -> String {
    fs::read_to_string(dir.join(artifact)).unwrap()
}

#[test]
fn sensor_artifacts() {
    init_logger();
    let output_dir = scratch_dir("ekf_derivation_sensor_artifacts");
    let config = DerivationConfig::builder()
        .output_dir(output_dir.clone())
        .covariance(false)
        .sensors(vec![Sensor::BodyVelocity, Sensor::GpsYaw, Sensor::OpticalFlow])
        .build();

    let report = DerivationProcess::new(config).unwrap().run().unwrap();
    assert_eq!(
        file_names(&report.artifacts),
        vec![
            "gps_yaw_generated.cpp",
            "flow_generated.cpp",
            "flow_generated_alt.cpp",
            "vel_bf_generated.cpp",
            "vel_bf_generated_alt.cpp",
        ]
    );
    assert_eq!(report.symbols[0], "dt");
    for name in ["R_YAW", "ant_yaw", "range", "R_LOS", "Tbs(0,0)", "Tbs(2,2)", "R_VEL"] {
        assert!(report.symbols.iter().any(|s| s == name), "{name}");
    }

    // Single axis layout
    let gps_yaw = read(&output_dir, "gps_yaw_generated.cpp");
    assert!(gps_yaw.starts_with("// Sub Expressions\nconst float HK0 = "));
    assert!(gps_yaw.contains("\n// Observation Jacobians\nHfusion(0) = "));
    assert!(gps_yaw.contains("\n// Kalman gains\nKfusion(0) = "));
    assert_eq!(gps_yaw.matches("Hfusion(").count(), 24);
    assert_eq!(gps_yaw.matches("Kfusion(").count(), 24);
    assert!(gps_yaw.contains("Kfusion(23) = "));
    assert!(!gps_yaw.contains(" - axis"));
    assert!(gps_yaw.ends_with(";\n\n\n"));

    // Labelled axes, each with the single axis layout
    let flow = read(&output_dir, "flow_generated.cpp");
    assert!(flow.starts_with("// X Axis Equations\n// Sub Expressions\n"));
    assert!(flow.contains("\n// Y Axis Equations\n// Sub Expressions\n"));
    assert_eq!(flow.matches("// Observation Jacobians\n").count(), 2);
    assert!(flow.contains("/range"));

    // Batched layout
    let flow_alt = read(&output_dir, "flow_generated_alt.cpp");
    assert_eq!(flow_alt.matches("// Sub Expressions").count(), 1);
    assert!(flow_alt.contains("// Observation Jacobians - axis 0\n"));
    assert!(flow_alt.contains("// Kalman gains - axis 1\n"));
    assert_eq!(flow_alt.matches("Hfusion(").count(), 2 * 24);

    // Unlabelled blocks with the names of the velocity fusion
    let vel_bf = read(&output_dir, "vel_bf_generated.cpp");
    assert!(vel_bf.starts_with("// axis 0\nconst float HK0 = "));
    assert_eq!(vel_bf.matches("// axis ").count(), 3);
    assert_eq!(vel_bf.matches("H_VEL(").count(), 3 * 24);
    assert_eq!(vel_bf.matches("Kfusion(").count(), 3 * 24);
    assert!(!vel_bf.contains("Observation Jacobians"));

    let vel_bf_alt = read(&output_dir, "vel_bf_generated_alt.cpp");
    assert!(vel_bf_alt.contains("// Kalman gains - axis 2\n"));
    assert!(!vel_bf_alt.contains("H_VEL"));
}

#[test]
fn yaml_configured_run() {
    let output_dir = scratch_dir("ekf_derivation_yaml_run");
    let yaml = format!(
        "output_dir: {}\ncovariance: false\nsensors: [Yaw, Declination]\n",
        output_dir.display()
    );
    let config = DerivationConfig::loads(&yaml).unwrap();
    assert_eq!(config.sensors(), vec![Sensor::Yaw, Sensor::Declination]);

    let report = DerivationProcess::new(config).unwrap().run().unwrap();
    assert_eq!(
        file_names(&report.artifacts),
        vec!["yaw_generated.cpp", "mag_decl_generated.cpp"]
    );

    let yaw = read(&output_dir, "yaw_generated.cpp");
    let headings: Vec<&str> = yaw.lines().filter(|l| l.starts_with("// ")).collect();
    assert_eq!(
        headings,
        vec![
            "// calculate 321 yaw observation matrix - option A",
            "// calculate 321 yaw observation matrix - option B",
            "// calculate 312 yaw observation matrix - option A",
            "// calculate 312 yaw observation matrix - option B",
        ]
    );
    assert!(yaw.contains("const float SA0 = "));
    assert!(yaw.contains("const float SB0 = "));
    assert_eq!(yaw.matches("H_YAW(23) = ").count(), 4);
    assert!(!yaw.contains("Kfusion"));
    // Yaw does not depend on the velocity
    assert_eq!(yaw.matches("H_YAW(4) = 0;").count(), 4);

    let decl = read(&output_dir, "mag_decl_generated.cpp");
    assert!(decl.contains("R_DECL"));
}

#[test]
fn invalid_configuration() {
    let config = DerivationConfig::builder()
        .covariance(false)
        .sensors(vec![])
        .build();
    assert!(matches!(
        DerivationProcess::new(config),
        Err(DerivationError::Config { .. })
    ));

    assert!(DerivationConfig::loads("covariance: maybe").is_err());
}
