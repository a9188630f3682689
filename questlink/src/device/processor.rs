// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::com::{Fabric, Input, Output, TimestampedValue};
use crate::configuration::device::{DeviceConfig, FieldBounds};
use crate::error::Error;
use crate::messages::{CommandType, ProtobufCommand, ProtobufCommandResponse};
use crate::pose::Pose2d;
use crate::timestamp::Timestamp;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::Duration;

/// Applies accepted pose resets to the tracking pipeline.
///
/// An `Err` carries the message reported back to the controller.
pub trait PoseResetHandler {
    fn reset_pose(&mut self, target: Pose2d) -> Result<(), String>;
}

impl<F> PoseResetHandler for F
where
    F: FnMut(Pose2d) -> Result<(), String>,
{
    fn reset_pose(&mut self, target: Pose2d) -> Result<(), String> {
        self(target)
    }
}

/// Executes commands from the request topic and answers on the response topic
pub struct CommandProcessor {
    requests: Input<ProtobufCommand>,
    responses: Output<ProtobufCommandResponse>,
    handler: Box<dyn PoseResetHandler>,
    command_ttl: Duration,
    field_bounds: FieldBounds,
    /// The request topic keeps showing the last command, so remember which publish was handled.
    /// A restarted controller reuses ids, so the id alone does not identify a command.
    last_handled: Option<(u32, Timestamp)>,
}

impl CommandProcessor {
    pub fn new(
        fabric: Arc<dyn Fabric>,
        config: &DeviceConfig,
        handler: Box<dyn PoseResetHandler>,
    ) -> Result<Self, Error> {
        Ok(Self {
            requests: Input::get(fabric.clone(), &config.topics.request)?,
            responses: Output::get(fabric, &config.topics.response),
            handler,
            command_ttl: config.command_ttl,
            field_bounds: config.field_bounds,
            last_handled: None,
        })
    }

    /// Handle the current command if it was not handled yet.
    ///
    /// Returns the published response, if any.
    pub fn process(&mut self) -> Result<Option<ProtobufCommandResponse>, Error> {
        let Some(command) = self.requests.read() else {
            return Ok(None);
        };
        let id = command.value.command_id;
        let handled = (id, command.server_time);
        if self.last_handled == Some(handled) {
            return Ok(None);
        }

        let response = match CommandType::try_from(command.value.r#type) {
            Ok(CommandType::Unspecified) => {
                trace!("Ignoring unspecified command {id}");
                return Ok(None);
            }
            Ok(CommandType::PoseReset) => self.pose_reset(&command),
            Err(_) => {
                warn!(
                    "Ignoring command {id} of unknown type {}",
                    command.value.r#type
                );
                self.last_handled = Some(handled);
                return Ok(None);
            }
        };

        // Mark before publishing so a failed write never applies a reset twice
        self.last_handled = Some(handled);
        self.responses.write(&response)?;
        Ok(Some(response))
    }

    fn pose_reset(&mut self, command: &TimestampedValue<ProtobufCommand>) -> ProtobufCommandResponse {
        let id = command.value.command_id;
        let age = self
            .requests
            .now()
            .saturating_duration_since(command.server_time);
        if age >= self.command_ttl {
            info!(
                "Refusing pose reset {id}: age {} ms >= {} ms",
                age.as_millis(),
                self.command_ttl.as_millis()
            );
            return ProtobufCommandResponse::failure(
                id,
                format!(
                    "Pose reset command too old: age {} ms >= {} ms",
                    age.as_millis(),
                    self.command_ttl.as_millis()
                ),
            );
        }

        let Some(target) = command.value.target_pose() else {
            warn!("Refusing pose reset {id}: no target pose");
            return ProtobufCommandResponse::failure(id, "Pose reset command without target pose");
        };
        if !target.is_finite() {
            warn!("Refusing pose reset {id}: invalid target {target}");
            return ProtobufCommandResponse::failure(id, format!("Invalid target pose {target}"));
        }
        if !self.field_bounds.contains(&target) {
            warn!("Refusing pose reset {id}: target {target} out of field bounds");
            return ProtobufCommandResponse::failure(
                id,
                format!("Target pose {target} out of field bounds"),
            );
        }

        debug!("Executing pose reset {id} to {target}, age {age:?}");
        match self.handler.reset_pose(target) {
            Ok(()) => {
                info!("Pose reset {id} to {target} applied");
                ProtobufCommandResponse::success(id)
            }
            Err(message) => {
                warn!("Pose reset {id} failed: {message}");
                ProtobufCommandResponse::failure(id, message)
            }
        }
    }
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("command_ttl", &self.command_ttl)
            .field("field_bounds", &self.field_bounds)
            .field("last_handled", &self.last_handled)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::CommandProcessor;
    use crate::com::{Fabric, Input, LocalFabric, Output};
    use crate::configuration::device::DeviceConfig;
    use crate::correlator::{CommandId, CommandOutcome, Correlator};
    use crate::messages::{ProtobufCommand, ProtobufCommandResponse};
    use crate::pose::Pose2d;
    use crate::timestamp::{ManualClock, Timestamp};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Setup {
        clock: Arc<ManualClock>,
        fabric: Arc<dyn Fabric>,
        processor: CommandProcessor,
        requests: Output<ProtobufCommand>,
        responses: Input<ProtobufCommandResponse>,
        applied: Arc<Mutex<Vec<Pose2d>>>,
    }

    fn setup_with(result: Result<(), String>) -> Setup {
        let clock = Arc::new(ManualClock::new(Timestamp::from_micros(1_000_000)));
        let fabric: Arc<dyn Fabric> = Arc::new(LocalFabric::with_clock(clock.clone()));
        let config = DeviceConfig::default();
        let applied = Arc::new(Mutex::new(Vec::new()));
        let recorded = applied.clone();
        let handler = move |pose: Pose2d| {
            recorded.lock().unwrap().push(pose);
            result.clone()
        };

        Setup {
            clock,
            fabric: fabric.clone(),
            processor: CommandProcessor::new(fabric.clone(), &config, Box::new(handler)).unwrap(),
            requests: Output::get(fabric.clone(), &config.topics.request),
            responses: Input::get(fabric, &config.topics.response).unwrap(),
            applied,
        }
    }

    fn setup() -> Setup {
        setup_with(Ok(()))
    }

    #[test]
    fn nothing_to_do_without_command() {
        let mut setup = setup();
        assert_eq!(setup.processor.process().unwrap(), None);
        assert!(setup.responses.read().is_none());
    }

    #[test]
    fn fresh_pose_reset_is_applied_once() {
        let mut setup = setup();
        let target = Pose2d::new(4.0, 2.0, 30.0);
        setup
            .requests
            .write(&ProtobufCommand::pose_reset(1, target))
            .unwrap();
        setup.clock.advance(Duration::from_millis(10));

        let response = setup.processor.process().unwrap();
        assert_eq!(response, Some(ProtobufCommandResponse::success(1)));
        assert_eq!(
            setup.responses.read().unwrap().value,
            ProtobufCommandResponse::success(1)
        );

        // Still visible on the topic, but already handled
        assert_eq!(setup.processor.process().unwrap(), None);
        assert_eq!(*setup.applied.lock().unwrap(), vec![target]);
    }

    #[test]
    fn old_command_is_refused() {
        let mut setup = setup();
        setup
            .requests
            .write(&ProtobufCommand::pose_reset(1, Pose2d::new(1.0, 1.0, 0.0)))
            .unwrap();
        setup.clock.advance(Duration::from_millis(50));

        let response = setup.processor.process().unwrap().unwrap();
        assert!(!response.success);
        assert_eq!(response.command_id, 1);
        assert!(response.error_message.contains("too old"));
        assert!(setup.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn invalid_targets_are_refused() {
        let mut setup = setup();
        let targets = [
            Pose2d::new(f64::NAN, 1.0, 0.0),
            Pose2d::new(1.0, 1.0, f64::INFINITY),
            Pose2d::new(-1.0, 1.0, 0.0),
            Pose2d::new(1.0, 9.0, 0.0),
            Pose2d::new(18.0, 1.0, 0.0),
        ];
        for (id, target) in (1..).zip(targets) {
            setup
                .requests
                .write(&ProtobufCommand::pose_reset(id, target))
                .unwrap();
            let response = setup.processor.process().unwrap().unwrap();
            assert_eq!(response.command_id, id);
            assert!(!response.success, "{target} accepted");
        }
        assert!(setup.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_target_is_refused() {
        let mut setup = setup();
        let mut command = ProtobufCommand::pose_reset(1, Pose2d::ZERO);
        command.payload = None;
        setup.requests.write(&command).unwrap();

        let response = setup.processor.process().unwrap().unwrap();
        assert!(!response.success);
        assert!(response.error_message.contains("without target"));
    }

    #[test]
    fn handler_failure_is_reported() {
        let mut setup = setup_with(Err("tracking not initialized".to_owned()));
        setup
            .requests
            .write(&ProtobufCommand::pose_reset(3, Pose2d::new(1.0, 1.0, 0.0)))
            .unwrap();

        let response = setup.processor.process().unwrap().unwrap();
        assert_eq!(
            response,
            ProtobufCommandResponse::failure(3, "tracking not initialized")
        );
    }

    #[test]
    fn unspecified_and_unknown_types_get_no_response() {
        let mut setup = setup();
        let mut command = ProtobufCommand::pose_reset(1, Pose2d::new(1.0, 1.0, 0.0));
        command.r#type = 0;
        setup.requests.write(&command).unwrap();
        assert_eq!(setup.processor.process().unwrap(), None);

        command.command_id = 2;
        command.r#type = 42;
        setup.requests.write(&command).unwrap();
        assert_eq!(setup.processor.process().unwrap(), None);
        assert!(setup.responses.read().is_none());
        assert!(setup.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn newer_command_is_handled() {
        let mut setup = setup();
        setup
            .requests
            .write(&ProtobufCommand::pose_reset(1, Pose2d::new(1.0, 1.0, 0.0)))
            .unwrap();
        setup.processor.process().unwrap();
        setup
            .requests
            .write(&ProtobufCommand::pose_reset(2, Pose2d::new(2.0, 2.0, 0.0)))
            .unwrap();

        let response = setup.processor.process().unwrap();
        assert_eq!(response, Some(ProtobufCommandResponse::success(2)));
        assert_eq!(setup.applied.lock().unwrap().len(), 2);
    }

    #[test]
    fn reused_id_from_restarted_controller_is_handled() {
        let mut setup = setup();
        let config = DeviceConfig::default();
        let first = Pose2d::new(1.0, 1.0, 0.0);
        let second = Pose2d::new(5.0, 3.0, 45.0);

        let mut correlator = Correlator::new(setup.fabric.clone(), &config.topics).unwrap();
        correlator.reset_pose(first).unwrap();
        setup.processor.process().unwrap();
        assert_eq!(
            correlator.poll(),
            Some(CommandOutcome::Succeeded(CommandId::new(1)))
        );

        // Same id, new session
        setup.clock.advance(Duration::from_secs(10));
        let mut restarted = Correlator::new(setup.fabric.clone(), &config.topics).unwrap();
        let id = restarted.reset_pose(second).unwrap();
        assert_eq!(id, CommandId::new(1));
        assert_eq!(restarted.poll(), None);

        setup.clock.advance(Duration::from_millis(5));
        let response = setup.processor.process().unwrap();
        assert_eq!(response, Some(ProtobufCommandResponse::success(1)));
        assert_eq!(*setup.applied.lock().unwrap(), vec![first, second]);
        assert_eq!(restarted.poll(), Some(CommandOutcome::Succeeded(id)));
        assert_eq!(setup.processor.process().unwrap(), None);
    }
}
