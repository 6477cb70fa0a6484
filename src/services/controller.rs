//! Service controller - dispatches service actions to the orchestration CLI

use crate::command::{CommandLine, CommandReport, CommandRunner};
use crate::config::ServiceConfig;
use device_agent_shared::service::{parse_service_names, parse_service_table};
use device_agent_shared::{ContainerAction, ServiceAction, ServiceActionRequest, ServiceDescriptor};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Separates options from service names, so a name is never read as a flag
const END_OF_OPTIONS: &str = "--";

/// Commands issued for one target service
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub service: String,
    pub commands: Vec<CommandReport>,
}

impl TargetReport {
    pub fn succeeded(&self) -> bool {
        self.commands.iter().all(CommandReport::succeeded)
    }
}

/// Runs compose and container commands for the selected services
pub struct ServiceController {
    runner: Arc<dyn CommandRunner>,
    config: ServiceConfig,
}

impl ServiceController {
    pub fn new(runner: Arc<dyn CommandRunner>, config: ServiceConfig) -> Self {
        Self { runner, config }
    }

    /// Names of the running containers
    pub async fn list_running(&self) -> Vec<ServiceDescriptor> {
        let command = CommandLine::new(self.config.docker_program.as_str())
            .args(["ps", "--format", "{{.Names}}"]);
        let output = self.runner.run(&command).await;
        if !output.success() {
            warn!(exit_code = ?output.exit_code, "listing running services failed");
        }
        parse_service_names(&output.stdout)
    }

    /// Every container with its status text
    pub async fn list_all(&self) -> Vec<ServiceDescriptor> {
        let command = CommandLine::new(self.config.docker_program.as_str())
            .args(["ps", "-a", "--format", "{{.Names}} {{.Status}}"]);
        let output = self.runner.run(&command).await;
        if !output.success() {
            warn!(exit_code = ?output.exit_code, "listing services failed");
        }
        parse_service_table(&output.stdout)
    }

    /// Apply the request's action to each selected target in turn
    ///
    /// A missing or unknown action issues no command. A failing target
    /// does not stop the remaining ones.
    pub async fn apply(&self, request: &ServiceActionRequest) -> Vec<TargetReport> {
        let Some(action) = request.action else {
            error!(
                action = ?request.requested_action,
                targets = request.targets.len(),
                "Unknown action"
            );
            return Vec::new();
        };

        info!(%action, targets = request.targets.len(), "applying service action");

        let mut reports = Vec::with_capacity(request.targets.len());
        for service in &request.targets {
            let commands = match action {
                ServiceAction::Restart => vec![self.compose(["restart"], service).await],
                ServiceAction::Stop => vec![self.compose(["stop"], service).await],
                ServiceAction::Update => self.pull_and_recreate(service).await,
            };

            let report = TargetReport {
                service: service.clone(),
                commands,
            };
            if !report.succeeded() {
                warn!(%action, service = %service, "service action failed");
            }
            reports.push(report);
        }

        reports
    }

    /// Run a container runtime action directly against each service
    pub async fn apply_custom(&self, action: ContainerAction, services: &[String]) -> Vec<TargetReport> {
        info!(%action, targets = services.len(), "applying container action");

        let mut reports = Vec::with_capacity(services.len());
        for service in services {
            let command = CommandLine::new(self.config.docker_program.as_str())
                .arg(action.as_str())
                .arg(END_OF_OPTIONS)
                .arg(service.as_str());
            let output = self.runner.run(&command).await;
            let report = TargetReport {
                service: service.clone(),
                commands: vec![CommandReport { command, output }],
            };
            if !report.succeeded() {
                warn!(%action, service = %service, "container action failed");
            }
            reports.push(report);
        }

        reports
    }

    /// Pull the image; recreate only when the pull succeeded
    async fn pull_and_recreate(&self, service: &str) -> Vec<CommandReport> {
        let pull = self.compose(["pull"], service).await;
        if !pull.succeeded() {
            warn!(service, "image pull failed, container not recreated");
            return vec![pull];
        }

        let recreate = self.compose(["up", "-d", "--force-recreate"], service).await;
        vec![pull, recreate]
    }

    /// Compose subcommand against one service; the name always follows `--`
    async fn compose<const N: usize>(&self, subcommand: [&str; N], service: &str) -> CommandReport {
        let command = CommandLine::new(self.config.compose_program.as_str())
            .arg("-f")
            .arg(self.config.compose_file.to_string_lossy())
            .args(subcommand)
            .arg(END_OF_OPTIONS)
            .arg(service);
        let output = self.runner.run(&command).await;
        CommandReport { command, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::command::CommandOutput;
    use serde_json::json;

    const COMPOSE: &str = "docker-compose -f /home/root/mapio/docker-compose.yml";

    fn controller(runner: &Arc<RecordingRunner>) -> ServiceController {
        ServiceController::new(runner.clone(), ServiceConfig::default())
    }

    #[tokio::test]
    async fn test_stop_only_selected_target() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "stop"}),
            json!({"service": "A", "selected": true}),
            json!({"service": "B", "selected": false}),
        ]);

        let reports = controller(&runner).apply(&request).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(runner.call_lines(), vec![format!("{COMPOSE} stop -- a")]);
    }

    #[tokio::test]
    async fn test_restart_each_target_in_order() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"service": "Web", "selected": true}),
            json!({"service": "db", "selected": true}),
            json!({"action": "restart"}),
        ]);

        controller(&runner).apply(&request).await;

        assert_eq!(
            runner.call_lines(),
            vec![format!("{COMPOSE} restart -- web"), format!("{COMPOSE} restart -- db")]
        );
    }

    #[tokio::test]
    async fn test_update_pulls_then_recreates() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "update"}),
            json!({"service": "web", "selected": true}),
        ]);

        let reports = controller(&runner).apply(&request).await;

        assert!(reports[0].succeeded());
        assert_eq!(
            runner.call_lines(),
            vec![
                format!("{COMPOSE} pull -- web"),
                format!("{COMPOSE} up -d --force-recreate -- web"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_pull_skips_recreate_but_not_other_targets() {
        let runner = RecordingRunner::new();
        runner.respond("pull -- web", CommandOutput::exited(1, ""));
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "update"}),
            json!({"service": "web", "selected": true}),
            json!({"service": "db", "selected": true}),
        ]);

        let reports = controller(&runner).apply(&request).await;

        assert!(!reports[0].succeeded());
        assert!(reports[1].succeeded());
        assert_eq!(
            runner.call_lines(),
            vec![
                format!("{COMPOSE} pull -- web"),
                format!("{COMPOSE} pull -- db"),
                format!("{COMPOSE} up -d --force-recreate -- db"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_action_issues_nothing() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "explode"}),
            json!({"service": "web", "selected": true}),
        ]);

        let reports = controller(&runner).apply(&request).await;

        assert!(reports.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_service_name_is_a_single_argument() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "stop"}),
            json!({"service": "web && reboot", "selected": true}),
        ]);

        controller(&runner).apply(&request).await;

        let calls = runner.calls();
        assert_eq!(calls[0].args.last().map(String::as_str), Some("web && reboot"));
    }

    #[tokio::test]
    async fn test_dash_prefixed_name_is_not_an_option() {
        let runner = RecordingRunner::new();
        let request = ServiceActionRequest::from_items(&[
            json!({"action": "stop"}),
            json!({"service": "--timeout=0", "selected": true}),
        ]);
        let controller = controller(&runner);

        controller.apply(&request).await;
        controller
            .apply_custom(ContainerAction::Kill, &["--signal=HUP".to_string()])
            .await;

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].args,
            vec!["-f", "/home/root/mapio/docker-compose.yml", "stop", "--", "--timeout=0"]
        );
        assert_eq!(calls[1].args, vec!["kill", "--", "--signal=HUP"]);
    }

    #[tokio::test]
    async fn test_custom_action() {
        let runner = RecordingRunner::new();
        let services = vec!["grafana".to_string(), "influxdb".to_string()];

        let reports = controller(&runner)
            .apply_custom(ContainerAction::Pause, &services)
            .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(
            runner.call_lines(),
            vec!["docker pause -- grafana", "docker pause -- influxdb"]
        );
    }

    #[tokio::test]
    async fn test_listings() {
        let runner = RecordingRunner::new();
        runner.respond("ps --format", CommandOutput::exited(0, "web\ndb\n"));
        runner.respond("ps -a", CommandOutput::exited(0, "web Up 2 hours\nold Exited (1) 3 days ago\n"));
        let controller = controller(&runner);

        let running = controller.list_running().await;
        let all = controller.list_all().await;

        assert_eq!(running.len(), 2);
        assert_eq!(running[0].name, "web");
        assert_eq!(all[1].name, "old");
        assert_eq!(all[1].status.as_deref(), Some("Exited (1) 3 days ago"));
        assert_eq!(
            runner.call_lines(),
            vec![
                "docker ps --format {{.Names}}",
                "docker ps -a --format {{.Names}} {{.Status}}",
            ]
        );
    }
}
