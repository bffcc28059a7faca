//! Grammar for the debug-console control verbs.
//!
//! The console owns manual overrides that the validated host surface does
//! not expose: forcing individual deadlines and setting raw intervals of any
//! length. Parsing composes `winnow` combinators directly over the input
//! line; rendering of replies is left to the caller.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{digit1, space1};
use winnow::combinator::{alt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::one_of;

use crate::cap::CapStore;
use crate::config::{SECS_PER_DAY, SECS_PER_HOUR, SECS_PER_MINUTE};
use crate::extender::{ChargeExtender, ConsoleStatus, PowerMonitor, TickInstant};
use crate::sustain::SustainActuator;

/// Parsed console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    /// `enable` / `disable` — toggle the whole controller.
    SetEnabled(bool),
    /// `trigger <n><unit>` — raw trigger interval, deadlines untouched.
    SetTrigger(Duration),
    /// `reset <n><unit>` — raw reset interval, deadlines untouched.
    SetReset(Duration),
    /// `timeext <n><unit>` — force the mild-stage deadline.
    ForceStage1(Duration),
    /// `timeext2 <n><unit>` — force the deep-stage deadline.
    ForceStage2(Duration),
    /// `timerst <n><unit>` — force the reset deadline.
    ForceReset(Duration),
    /// Bare invocation — status snapshot.
    Status,
}

/// Reply produced by executing a console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleReply {
    Updated,
    Status(ConsoleStatus),
}

/// Parse failure, pointing at the first unconsumed byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConsoleError {
    pub offset: usize,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized console input at byte {}", self.offset)
    }
}

/// Parses one console line. An empty line is the status query.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleCommand::Status);
    }

    command
        .parse(trimmed)
        .map_err(|error| ConsoleError {
            offset: error.offset(),
        })
}

fn command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    alt((
        "enable".value(ConsoleCommand::SetEnabled(true)),
        "disable".value(ConsoleCommand::SetEnabled(false)),
        // `timeext2` must be tried before its `timeext` prefix.
        preceded(("timeext2", space1), duration).map(ConsoleCommand::ForceStage2),
        preceded(("timeext", space1), duration).map(ConsoleCommand::ForceStage1),
        preceded(("timerst", space1), duration).map(ConsoleCommand::ForceReset),
        preceded(("trigger", space1), duration).map(ConsoleCommand::SetTrigger),
        preceded(("reset", space1), duration).map(ConsoleCommand::SetReset),
    ))
    .parse_next(input)
}

fn duration(input: &mut &str) -> ModalResult<Duration, ContextError> {
    let count = digit1.parse_to::<u64>().parse_next(input)?;
    let unit = one_of(['s', 'm', 'h', 'd']).parse_next(input)?;
    let scale = match unit {
        'd' => SECS_PER_DAY,
        'h' => SECS_PER_HOUR,
        'm' => SECS_PER_MINUTE,
        _ => 1,
    };
    Ok(Duration::from_secs(count.saturating_mul(scale)))
}

impl ConsoleCommand {
    /// Executes the command against a controller.
    pub fn apply<I, P, A, S>(
        self,
        extender: &mut ChargeExtender<I, P, A, S>,
        now: I,
    ) -> ConsoleReply
    where
        I: TickInstant,
        P: PowerMonitor,
        A: SustainActuator,
        S: CapStore,
    {
        match self {
            ConsoleCommand::SetEnabled(enabled) => {
                extender.set_disabled(!enabled, now);
                ConsoleReply::Updated
            }
            ConsoleCommand::SetTrigger(interval) => {
                extender.force_trigger_interval(interval);
                ConsoleReply::Updated
            }
            ConsoleCommand::SetReset(interval) => {
                extender.force_reset_interval(interval);
                ConsoleReply::Updated
            }
            ConsoleCommand::ForceStage1(delay) => {
                extender.force_stage1_deadline(delay, now);
                ConsoleReply::Updated
            }
            ConsoleCommand::ForceStage2(delay) => {
                extender.force_stage2_deadline(delay, now);
                ConsoleReply::Updated
            }
            ConsoleCommand::ForceReset(delay) => {
                extender.force_reset_deadline(delay, now);
                ConsoleReply::Updated
            }
            ConsoleCommand::Status => ConsoleReply::Status(extender.console_status(now)),
        }
    }
}
