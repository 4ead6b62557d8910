use std::collections::BTreeMap;

use coingro_types::BotConfig;
use k8s_openapi::{
    api::core::v1::{
        Container, ContainerPort, EnvVar, HTTPGetAction, PersistentVolumeClaimVolumeSource, Pod,
        PodSecurityContext, PodSpec, Probe, ResourceRequirements, Service, ServicePort,
        ServiceSpec, Volume, VolumeMount,
    },
    apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
};
use kube::api::ObjectMeta;

use crate::{
    config::Config,
    constants::{CG_BIN, DEFAULT_CONFIG_SAVE, STRATEGIES_DIR},
    error::Error,
};

pub const CREATOR: &str = "coingro-controller";
pub const APP_LABEL: &str = "coingro-bot";
pub const API_PORT_NAME: &str = "api-server-port";

const CONTAINER_NAME: &str = "coingro-container";
const STRATEGIES_VOLUME: &str = "strategies";
const CONFIG_HEREDOC: &str = "COINGRO_CONFIG";

/// Pure renderer from a bot identity plus configuration to the Service and
/// Pod specs that realize it. Performs no I/O.
#[derive(Clone, Debug)]
pub struct Resources {
    namespace: String,
    cg_port: u16,
    image: String,
    env_vars: BTreeMap<String, String>,
    strategies_pvc_claim: String,
    user_data_dir: String,
    fs_group: Option<i64>,
}

impl Resources {
    pub fn new(config: &Config) -> Self {
        Resources {
            namespace: config.namespace.clone(),
            cg_port: config.cg_api_server_port,
            image: config.cg_image.clone(),
            env_vars: config.cg_env_vars.clone(),
            strategies_pvc_claim: config.cg_strategies_pvc_claim.clone(),
            user_data_dir: config.user_data_dir().display().to_string(),
            fs_group: config.cguser_group_id,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn pod_labels(&self, name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("name".to_string(), name.to_string()),
            ("run".to_string(), name.to_string()),
            ("app".to_string(), APP_LABEL.to_string()),
            ("creator".to_string(), CREATOR.to_string()),
        ])
    }

    pub fn service(&self, name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([
                    ("name".to_string(), name.to_string()),
                    ("creator".to_string(), CREATOR.to_string()),
                ])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(self.pod_labels(name)),
                ports: Some(vec![ServicePort {
                    name: Some(API_PORT_NAME.to_string()),
                    protocol: Some("TCP".to_string()),
                    port: 80,
                    target_port: Some(IntOrString::Int(self.cg_port as i32)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            status: None,
        }
    }

    /// The container boots by writing its own configuration file and then
    /// replacing the shell with the trading process.
    pub fn startup_script(&self, bot_config: &BotConfig) -> Result<String, Error> {
        let config_json = serde_json::to_string_pretty(bot_config)?;
        let config_dir = format!("{}/config", self.user_data_dir.trim_end_matches('/'));
        Ok(format!(
            "mkdir -p {dir} && cat <<'{eof}' > {dir}/{file}\n{json}\n{eof}\nexec {bin} trade",
            dir = config_dir,
            eof = CONFIG_HEREDOC,
            file = DEFAULT_CONFIG_SAVE,
            json = config_json,
            bin = CG_BIN,
        ))
    }

    pub fn pod(
        &self,
        name: &str,
        bot_config: &BotConfig,
        env_overrides: &BTreeMap<String, String>,
    ) -> Result<Pod, Error> {
        let mut env = self.env_vars.clone();
        env.extend(env_overrides.clone());
        env.insert("CG_BOT_ID".to_string(), name.to_string());
        env.insert("COINGRO__LOGFILE".to_string(), "default".to_string());
        let env_list: Vec<EnvVar> = env
            .into_iter()
            .map(|(name, value)| EnvVar {
                name,
                value: Some(value),
                ..Default::default()
            })
            .collect();

        let liveness_probe = Probe {
            http_get: Some(HTTPGetAction {
                path: Some("api/v1/ping".to_string()),
                port: IntOrString::Int(self.cg_port as i32),
                ..Default::default()
            }),
            initial_delay_seconds: Some(600),
            period_seconds: Some(120),
            failure_threshold: Some(1),
            ..Default::default()
        };

        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.image.clone()),
            command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            args: Some(vec![self.startup_script(bot_config)?]),
            env: Some(env_list),
            liveness_probe: Some(liveness_probe),
            ports: Some(vec![ContainerPort {
                name: Some(API_PORT_NAME.to_string()),
                container_port: self.cg_port as i32,
                ..Default::default()
            }]),
            volume_mounts: Some(vec![VolumeMount {
                name: STRATEGIES_VOLUME.to_string(),
                mount_path: format!("{}/", STRATEGIES_DIR),
                read_only: Some(true),
                ..Default::default()
            }]),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("100m".to_string())),
                    ("memory".to_string(), Quantity("256Mi".to_string())),
                ])),
                limits: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("500m".to_string())),
                    ("memory".to_string(), Quantity("512Mi".to_string())),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        };

        Ok(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(self.namespace.clone()),
                labels: Some(self.pod_labels(name)),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![container],
                volumes: Some(vec![Volume {
                    name: STRATEGIES_VOLUME.to_string(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: self.strategies_pvc_claim.clone(),
                        read_only: Some(true),
                    }),
                    ..Default::default()
                }]),
                security_context: self.fs_group.map(|fs_group| PodSecurityContext {
                    fs_group: Some(fs_group),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_resources() -> Resources {
        Resources {
            namespace: "coingro".to_string(),
            cg_port: 8080,
            image: "coingro/coingro:1.0.0".to_string(),
            env_vars: BTreeMap::from([("COINGRO__DRY_RUN".to_string(), "true".to_string())]),
            strategies_pvc_claim: "strategies-pvc".to_string(),
            user_data_dir: "/coingro/user_data".to_string(),
            fs_group: Some(1000),
        }
    }

    fn test_bot_config() -> BotConfig {
        serde_json::from_value(serde_json::json!({
            "bot_name": "Süße Möwe",
            "strategy": "Strategy001",
            "max_open_trades": -1,
        }))
        .unwrap()
    }

    #[test]
    fn service_exposes_port_80_to_the_api_port() {
        let service = test_resources().service("coingro01");
        assert_eq!(service.metadata.name.as_deref(), Some("coingro01"));
        let labels = service.metadata.labels.unwrap();
        assert_eq!(labels["name"], "coingro01");
        assert_eq!(labels["creator"], CREATOR);

        let spec = service.spec.unwrap();
        let selector = spec.selector.unwrap();
        assert_eq!(selector["run"], "coingro01");
        assert_eq!(selector["app"], APP_LABEL);

        let port = &spec.ports.unwrap()[0];
        assert_eq!(port.name.as_deref(), Some(API_PORT_NAME));
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(8080)));
    }

    #[test]
    fn startup_script_embeds_pretty_config_and_exec() {
        let script = test_resources().startup_script(&test_bot_config()).unwrap();
        assert!(script.starts_with("mkdir -p /coingro/user_data/config"));
        assert!(script.contains("> /coingro/user_data/config/config.json"));
        // Pretty-printed, non-ASCII preserved.
        assert!(script.contains("\"bot_name\": \"Süße Möwe\""));
        assert!(script.contains("\"max_open_trades\": -1"));
        assert!(script.ends_with("exec coingro trade"));
    }

    #[test]
    fn pod_env_merges_overrides_and_identity() {
        let overrides = BTreeMap::from([
            ("COINGRO__STRATEGY".to_string(), "Strategy01".to_string()),
            ("COINGRO__DRY_RUN".to_string(), "false".to_string()),
        ]);
        let pod = test_resources()
            .pod("strategy01", &test_bot_config(), &overrides)
            .unwrap();
        let container = &pod.spec.as_ref().unwrap().containers[0];
        let env: BTreeMap<_, _> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
            .collect();
        assert_eq!(env["CG_BOT_ID"], "strategy01");
        assert_eq!(env["COINGRO__LOGFILE"], "default");
        assert_eq!(env["COINGRO__STRATEGY"], "Strategy01");
        // Per-call overrides beat the controller-wide env.
        assert_eq!(env["COINGRO__DRY_RUN"], "false");
    }

    #[test]
    fn pod_probe_volumes_and_security_context() {
        let pod = test_resources()
            .pod("coingro01", &test_bot_config(), &BTreeMap::new())
            .unwrap();
        let spec = pod.spec.unwrap();
        assert_eq!(spec.security_context.unwrap().fs_group, Some(1000));

        let volume = &spec.volumes.as_ref().unwrap()[0];
        let claim = volume.persistent_volume_claim.as_ref().unwrap();
        assert_eq!(claim.claim_name, "strategies-pvc");
        assert_eq!(claim.read_only, Some(true));

        let container = &spec.containers[0];
        let mount = &container.volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/coingro/strategies/");
        assert_eq!(mount.read_only, Some(true));

        let probe = container.liveness_probe.as_ref().unwrap();
        assert_eq!(probe.initial_delay_seconds, Some(600));
        assert_eq!(probe.period_seconds, Some(120));
        assert_eq!(probe.failure_threshold, Some(1));
        assert_eq!(
            probe.http_get.as_ref().unwrap().path.as_deref(),
            Some("api/v1/ping")
        );
    }
}
