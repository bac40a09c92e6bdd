use std::path::Path;

use crate::docker::MountSpec;

use super::workspace::{
    AWS_DIR, CONTAINER_AWS_DIR, CONTAINER_HOME_DIR, CONTAINER_PACKER_DIR,
    CONTAINER_SCENARIOS_DIR, CONTAINER_TERRAFORM_DIR, HOME, PACKER, SCENARIOS, TERRAFORM,
};

/// Bind mounts for a run.
///
/// The persistent home and the user's AWS credentials are always mounted.
/// Dev mode appends the scenario, packer and terraform sources after them.
/// Host paths are not checked here; a missing directory surfaces as a
/// create failure from the engine.
pub fn build_mounts(base_dir: &Path, user_home: &Path, dev: bool) -> Vec<MountSpec> {
    let mut mounts = vec![
        MountSpec::bind(base_dir.join(HOME), CONTAINER_HOME_DIR),
        MountSpec::bind(user_home.join(AWS_DIR), CONTAINER_AWS_DIR).read_only(),
    ];

    if dev {
        mounts.extend([
            MountSpec::bind(base_dir.join(SCENARIOS), CONTAINER_SCENARIOS_DIR),
            MountSpec::bind(base_dir.join(PACKER), CONTAINER_PACKER_DIR),
            MountSpec::bind(base_dir.join(TERRAFORM), CONTAINER_TERRAFORM_DIR),
        ]);
    }

    mounts
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn base_mounts_only_outside_dev_mode() {
        let mounts = build_mounts(Path::new("/ws"), Path::new("/home/u"), false);
        assert_eq!(
            mounts,
            [
                MountSpec::bind("/ws/home", "/home/ubuntu"),
                MountSpec::bind("/home/u/.aws", "/home/ubuntu/.aws").read_only(),
            ]
        );
    }

    #[test]
    fn dev_mode_appends_three_source_mounts() {
        let mounts = build_mounts(Path::new("/ws"), Path::new("/home/u"), true);
        assert_eq!(mounts.len(), 5);

        let dev: Vec<_> = mounts[2..].iter().map(|m| m.source.clone()).collect();
        assert_eq!(
            dev,
            [
                PathBuf::from("/ws/scenarios"),
                PathBuf::from("/ws/packer"),
                PathBuf::from("/ws/terraform"),
            ]
        );
        assert!(mounts[2..].iter().all(|m| !m.read_only));
        assert_eq!(mounts[2].target, CONTAINER_SCENARIOS_DIR);
        assert_eq!(mounts[3].target, CONTAINER_PACKER_DIR);
        assert_eq!(mounts[4].target, CONTAINER_TERRAFORM_DIR);
    }

    #[test]
    fn same_input_same_mounts() {
        let a = build_mounts(Path::new("/ws"), Path::new("/home/u"), true);
        let b = build_mounts(Path::new("/ws"), Path::new("/home/u"), true);
        assert_eq!(a, b);
    }
}
