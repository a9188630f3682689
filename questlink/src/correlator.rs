// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Command/response correlation
//!
//! The controller keeps at most one command in flight on the request topic. Every command carries
//! a fresh id. The device answers on the response topic with the id of the command it executed.
//! Because both topics only hold their latest value, a response may belong to a command that has
//! since been superseded, and the same response stays visible across many polls. The
//! [Correlator] filters both cases out, so each response to the current command is acted upon
//! exactly once.

use crate::com::{Fabric, Input, Output, TimestampedValue};
use crate::configuration::topics::Topics;
use crate::error::Error;
use crate::messages::{command, CommandType, ProtobufCommand, ProtobufCommandResponse};
use crate::pose::Pose2d;
use crate::timestamp::Timestamp;
use log::{debug, trace, warn};
use std::fmt::Display;
use std::sync::Arc;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Id of an issued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u32);

impl CommandId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

impl From<CommandId> for u32 {
    fn from(id: CommandId) -> u32 {
        id.0
    }
}

/// Outcome of the current command, as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded(CommandId),
    Failed { id: CommandId, message: String },
}

impl CommandOutcome {
    pub fn id(&self) -> CommandId {
        match self {
            CommandOutcome::Succeeded(id) => *id,
            CommandOutcome::Failed { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded(_))
    }
}

/// Issues commands and matches responses to them.
///
/// Single owner by construction: both operations take `&mut self`.
#[derive(Debug)]
pub struct Correlator {
    requests: Output<ProtobufCommand>,
    responses: Input<ProtobufCommandResponse>,
    /// Id of the most recently issued command, 0 before the first one
    last_sent_id: u32,
    /// Id of the most recent response already acted upon, 0 before the first one
    last_processed_response_id: u32,
    /// Server time of the response visible when the current command was issued. It predates
    /// the command, even if an earlier session left the same id in it.
    response_at_issue: Timestamp,
}

impl Correlator {
    pub fn new(fabric: Arc<dyn Fabric>, topics: &Topics) -> Result<Self> {
        Ok(Self {
            requests: Output::get(fabric.clone(), &topics.request),
            responses: Input::get(fabric, &topics.response)?,
            last_sent_id: 0,
            last_processed_response_id: 0,
            response_at_issue: Timestamp::NEVER,
        })
    }

    /// Issue a command, replacing any command still in flight.
    ///
    /// The id is used up even if the fabric refuses the write, so ids are never reused.
    pub fn issue(
        &mut self,
        command_type: CommandType,
        payload: Option<command::Payload>,
    ) -> Result<CommandId> {
        let id = self
            .last_sent_id
            .checked_add(1)
            .ok_or(Error::CommandIdExhausted)?;
        self.last_sent_id = id;
        self.response_at_issue = self.responses.last_change();

        let command = ProtobufCommand {
            r#type: command_type.into(),
            command_id: id,
            payload,
        };
        debug!("Issuing {command_type:?} command {}", CommandId(id));
        self.requests.write(&command)?;
        Ok(CommandId(id))
    }

    /// Issue a pose reset to `target`
    pub fn reset_pose(&mut self, target: Pose2d) -> Result<CommandId> {
        let command = ProtobufCommand::pose_reset(0, target);
        self.issue(CommandType::PoseReset, command.payload)
    }

    /// Check for a response to the current command.
    ///
    /// Returns the outcome the first time a response to the most recently issued command is
    /// seen, `None` otherwise. A failure is logged as a warning but is not an error.
    pub fn poll(&mut self) -> Option<CommandOutcome> {
        let TimestampedValue {
            value: response,
            server_time,
        } = self.responses.read()?;
        let id = response.command_id;

        if id != self.last_sent_id {
            trace!(
                "Ignoring response to {}, current command is {}",
                CommandId(id),
                CommandId(self.last_sent_id)
            );
            return None;
        }
        if id == self.last_processed_response_id {
            return None;
        }
        if !self.response_at_issue.is_never() && server_time <= self.response_at_issue {
            trace!("Ignoring response to {} from before it was issued", CommandId(id));
            return None;
        }
        self.last_processed_response_id = id;

        let id = CommandId(id);
        if response.success {
            debug!("Command {id} succeeded");
            Some(CommandOutcome::Succeeded(id))
        } else {
            warn!("Command {id} failed: {}", response.error_message);
            Some(CommandOutcome::Failed {
                id,
                message: response.error_message,
            })
        }
    }

    /// The most recently issued command, unless its response was already processed
    pub fn pending(&self) -> Option<CommandId> {
        (self.last_sent_id != 0 && self.last_sent_id != self.last_processed_response_id)
            .then_some(CommandId(self.last_sent_id))
    }
}
