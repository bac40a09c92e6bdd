//! Fixed layout of a simulator workspace, on the host and in the container.

/// Host-side subdirectories of the workspace base dir.
pub const HOME: &str = "home";
pub const SCENARIOS: &str = "scenarios";
pub const PACKER: &str = "packer";
pub const TERRAFORM: &str = "terraform";

/// Credential directory under the invoking user's home.
pub const AWS_DIR: &str = ".aws";

/// Container-side mount targets.
pub const CONTAINER_HOME_DIR: &str = "/home/ubuntu";
pub const CONTAINER_AWS_DIR: &str = "/home/ubuntu/.aws";
pub const CONTAINER_SCENARIOS_DIR: &str = "/simulator/scenarios";
pub const CONTAINER_PACKER_DIR: &str = "/simulator/packer";
pub const CONTAINER_TERRAFORM_DIR: &str = "/simulator/terraform";

/// Host variables forwarded to the AWS SDK inside the container, in order.
pub const AWS_FORWARDED_VARS: [&str; 6] = [
    "AWS_PROFILE",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
];

/// Environment for the AWS SDK inside the container.
///
/// Forwards whichever of [`AWS_FORWARDED_VARS`] `lookup` resolves, then
/// asks the SDK to read the mounted `~/.aws/config`.
pub fn aws_env(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut env: Vec<String> = AWS_FORWARDED_VARS
        .iter()
        .filter_map(|key| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{key}={v}"))
        })
        .collect();
    env.push("AWS_SDK_LOAD_CONFIG=1".to_string());
    env
}

/// [`aws_env`] against the current process environment.
pub fn aws_env_from_process() -> Vec<String> {
    aws_env(|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_only_set_variables_in_order() {
        let env = aws_env(|key| match key {
            "AWS_REGION" => Some("eu-west-2".into()),
            "AWS_PROFILE" => Some("sim".into()),
            "AWS_SESSION_TOKEN" => Some(String::new()),
            _ => None,
        });
        assert_eq!(
            env,
            [
                "AWS_PROFILE=sim",
                "AWS_REGION=eu-west-2",
                "AWS_SDK_LOAD_CONFIG=1"
            ]
        );
    }

    #[test]
    fn always_loads_shared_config() {
        assert_eq!(aws_env(|_| None), ["AWS_SDK_LOAD_CONFIG=1"]);
    }
}
