//! Configuration files feeding a running manager

mod common;

use std::io::Write;
use std::time::Duration;

use parallax::{Parallax, ParallaxError, RealityError};
use plxconf::PlxConfig;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_default_reality_comes_from_config() {
    let file = config_file(
        r#"
[reality]
frame_interval_ms = 33
default_uri = "reality:street"
"#,
    );
    let config = PlxConfig::load_from(Some(file.path())).unwrap();
    assert_eq!(config.frame_interval(), Duration::from_millis(33));

    let manager = Parallax::manager(config);
    let err = manager.install_default_reality().unwrap_err();
    assert!(matches!(
        err,
        ParallaxError::Reality(RealityError::Unsupported(uri)) if uri == "reality:street"
    ));
    assert!(manager.reality.current_reality().is_none());
}

#[tokio::test]
async fn test_sampled_poses_from_config() {
    let file = config_file(
        r#"
[context]
sample_poses = true
max_samples = 4
"#,
    );
    let config = PlxConfig::load_from(Some(file.path())).unwrap();
    assert!(config.context.sample_poses);

    let manager = Parallax::manager(config);
    manager
        .context
        .process_frame(common::frame(1).with_entity("marker", common::fixed([1.0, 0.0, 0.0])))
        .unwrap();
    assert!(manager.context.get_pose("marker").is_known());
}
