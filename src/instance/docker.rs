use crate::config::ManageConfig;
use crate::error::{ManageError, ManageResult};
use crate::instance::{ExecOutput, ExecRequest, InstanceDescriptor, LifecycleService, StartOptions};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Image used when starting with version `local`.
const LOCAL_IMAGE: &str = "image-default";

/// [`LifecycleService`] backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerLifecycle {
    config: ManageConfig,
    docker_bin: String,
}

impl DockerLifecycle {
    pub fn new(config: ManageConfig) -> Self {
        Self {
            config,
            docker_bin: "docker".to_string(),
        }
    }

    pub async fn check_docker_available(&self) -> ManageResult<()> {
        Command::new(&self.docker_bin)
            .arg("--version")
            .output()
            .await
            .map_err(|e| ManageError::lifecycle(format!("Docker not available: {}", e)))?;
        Ok(())
    }

    async fn docker(&self, args: &[String]) -> ManageResult<Output> {
        debug!("{} {}", self.docker_bin, args.join(" "));
        Command::new(&self.docker_bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ManageError::lifecycle(format!("Failed to run {}: {}", self.docker_bin, e))
            })
    }

    async fn docker_checked(&self, args: &[String], action: &str) -> ManageResult<Output> {
        let output = self.docker(args).await?;
        if !output.status.success() {
            return Err(ManageError::lifecycle(format!(
                "{} failed: {}",
                action,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }

    async fn remove_container(&self, container_name: &str) -> ManageResult<()> {
        self.docker_checked(
            &["stop".to_string(), container_name.to_string()],
            "Container stop",
        )
        .await?;
        self.docker_checked(
            &["rm".to_string(), container_name.to_string()],
            "Container removal",
        )
        .await?;
        Ok(())
    }

    /// Run a command attached to the caller's terminal, returning its exit status.
    pub async fn exec_interactive(&self, hg_name: &str, request: &ExecRequest) -> ManageResult<i32> {
        let mut args = vec!["exec".to_string(), "-it".to_string()];
        args.extend(env_args(request));
        args.push(self.config.container_name(hg_name));
        args.push(request.program.clone());
        args.extend(request.args.iter().cloned());

        let status = Command::new(&self.docker_bin)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ManageError::lifecycle(format!("Failed to exec: {}", e)))?;
        Ok(status.code().unwrap_or(-1))
    }
}

fn env_args(request: &ExecRequest) -> Vec<String> {
    request
        .env
        .iter()
        .flat_map(|(k, v)| ["-e".to_string(), format!("{}={}", k, v)])
        .collect()
}

/// Arguments for `docker run` creating the container described by `options`.
pub(crate) fn run_args(config: &ManageConfig, options: &StartOptions, image: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        config.container_name(&options.hg_name),
        "--publish".to_string(),
        format!("{}:80", options.port),
        "--volume".to_string(),
        format!("{}:{}:rw", options.temp_dir.display(), config.container_temp_mount),
        "--volume".to_string(),
        format!("{}:{}:rw", options.data_dir.display(), config.container_data_mount),
    ];

    if let Some(media_dir) = &options.media_dir {
        args.push("--volume".to_string());
        args.push(format!(
            "{}:{}:rw",
            media_dir.display(),
            config.container_media_mount
        ));
        args.push("--env".to_string());
        args.push(format!("HIGLASS_MEDIA_ROOT={}", config.container_media_mount));
    }

    if let Some(site_url) = &options.site_url {
        args.push("--env".to_string());
        args.push(format!("SITE_URL={}", site_url));
    }

    args.push(image.to_string());
    args
}

/// Build a descriptor from one element of `docker inspect` output.
pub(crate) fn parse_inspect(
    config: &ManageConfig,
    hg_name: &str,
    inspect: &Value,
) -> ManageResult<InstanceDescriptor> {
    let running = inspect["State"]["Running"].as_bool().unwrap_or(false);

    let port = inspect["HostConfig"]["PortBindings"][crate::constants::CONTAINER_HTTP_PORT][0]
        ["HostPort"]
        .as_str()
        .ok_or_else(|| ManageError::lifecycle(format!("Instance {} has no port binding", hg_name)))?
        .parse::<u16>()
        .map_err(|e| ManageError::lifecycle(format!("Invalid host port: {}", e)))?;

    let mounts: Vec<(String, String)> = inspect["Mounts"]
        .as_array()
        .map(|mounts| {
            mounts
                .iter()
                .filter_map(|m| {
                    Some((
                        m["Source"].as_str()?.to_string(),
                        m["Destination"].as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    let mount_source = |destination: &str| {
        mounts
            .iter()
            .find(|(_, d)| d == destination)
            .map(|(s, _)| PathBuf::from(s))
    };

    let site_urls: Vec<&str> = inspect["Config"]["Env"]
        .as_array()
        .map(|env| {
            env.iter()
                .filter_map(Value::as_str)
                .filter_map(|e| e.strip_prefix("SITE_URL="))
                .collect()
        })
        .unwrap_or_default();

    let site_url = match site_urls.as_slice() {
        [] => "http://localhost".to_string(),
        [one] => one.to_string(),
        _ => {
            return Err(ManageError::lifecycle(format!(
                "There are multiple SITE_URL entries in {} env",
                config.container_name(hg_name)
            )))
        }
    };

    Ok(InstanceDescriptor {
        name: hg_name.to_string(),
        container_name: config.container_name(hg_name),
        running,
        port,
        temp_dir: mount_source(&config.container_temp_mount),
        data_dir: mount_source(&config.container_data_mount),
        media_dir: mount_source(&config.container_media_mount),
        site_url,
        mounts,
    })
}

#[async_trait]
impl LifecycleService for DockerLifecycle {
    async fn start(&self, options: &StartOptions) -> ManageResult<InstanceDescriptor> {
        let container_name = self.config.container_name(&options.hg_name);

        if self.inspect(&options.hg_name).await?.is_some() {
            info!("Stopping previously running container");
            self.remove_container(&container_name).await?;
        }

        let image = if options.version == "local" {
            LOCAL_IMAGE.to_string()
        } else {
            let image = format!("{}:{}", self.config.image, options.version);
            info!("Pulling image {}...", image);
            self.docker_checked(&["pull".to_string(), image.clone()], "Image pull")
                .await?;
            image
        };

        tokio::fs::create_dir_all(&options.temp_dir).await?;
        tokio::fs::create_dir_all(&options.data_dir).await?;

        info!("Data directory: {}", options.data_dir.display());
        info!("Temp directory: {}", options.temp_dir.display());
        info!("Starting {} on port {}", options.hg_name, options.port);

        self.docker_checked(&run_args(&self.config, options, &image), "Container start")
            .await?;
        info!("Docker started: {}", container_name);

        self.inspect(&options.hg_name)
            .await?
            .ok_or_else(|| ManageError::lifecycle(format!("{} vanished after start", container_name)))
    }

    async fn stop(&self, hg_name: &str) -> ManageResult<()> {
        if self.inspect(hg_name).await?.is_none() {
            return Err(ManageError::InstanceNotFound(hg_name.to_string()));
        }
        self.remove_container(&self.config.container_name(hg_name))
            .await
    }

    async fn inspect(&self, hg_name: &str) -> ManageResult<Option<InstanceDescriptor>> {
        let container_name = self.config.container_name(hg_name);
        let output = self
            .docker(&[
                "inspect".to_string(),
                "--type".to_string(),
                "container".to_string(),
                container_name.clone(),
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such") {
                return Ok(None);
            }
            return Err(ManageError::lifecycle(format!(
                "Inspecting {} failed: {}",
                container_name,
                stderr.trim()
            )));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout)?;
        match parsed.as_array().and_then(|a| a.first()) {
            Some(inspect) => parse_inspect(&self.config, hg_name, inspect).map(Some),
            None => Ok(None),
        }
    }

    async fn list(&self) -> ManageResult<Vec<InstanceDescriptor>> {
        let output = self
            .docker_checked(
                &[
                    "ps".to_string(),
                    "--format".to_string(),
                    "{{.Names}}".to_string(),
                ],
                "Listing containers",
            )
            .await?;

        let names: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| self.config.instance_name(line.trim()))
            .map(str::to_string)
            .collect();

        let mut instances = Vec::with_capacity(names.len());
        for name in names {
            if let Some(descriptor) = self.inspect(&name).await? {
                instances.push(descriptor);
            }
        }
        Ok(instances)
    }

    async fn exec(&self, hg_name: &str, request: &ExecRequest) -> ManageResult<ExecOutput> {
        let mut args = vec!["exec".to_string()];
        args.extend(env_args(request));
        args.push(self.config.container_name(hg_name));
        args.push(request.program.clone());
        args.extend(request.args.iter().cloned());

        let output = self.docker(&args).await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ExecOutput {
            exit_code: output.status.code().map(i64::from).unwrap_or(-1),
            output: combined,
        })
    }
}
