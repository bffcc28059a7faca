//! Simulated environment driving the shared extender core.
//!
//! The session owns a virtual clock, a fake charger, and an in-memory cap
//! byte, and steps the controller at its real one-second cadence. Commands
//! mirror the two host configuration channels plus the debug-console verbs,
//! which makes long staging timelines reproducible by hand.

use core::ops::Add;
use core::time::Duration;

use extender_core::cap::{CapStore, ChargeCap, ChargeLimitModes, ChargeLimitRequest};
use extender_core::command::{EXTENDER_READ_CMD, EXTENDER_WRITE_CMD, ExtenderParams};
use extender_core::config::{SECS_PER_DAY, SECS_PER_HOUR, SECS_PER_MINUTE};
use extender_core::console::{self, ConsoleReply};
use extender_core::events::{EventRecorder, ExtenderEvent};
use extender_core::extender::{
    ChargeExtender, ConsoleStatus, ExtenderStatus, PowerMonitor, Stage, TickInstant,
};
use extender_core::sustain::{ChargeControlMode, SustainActuator, SustainBand};

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("tick", "tick [n]                   - run n one-second ticks (default 1)"),
    ("advance", "advance <n><s|m|h|d>       - run ticks until the duration elapses"),
    ("plug", "plug / unplug              - toggle external power"),
    ("factory", "factory on|off             - toggle the factory-mode signal"),
    ("write", "write [trigger=<days>] [reset=<minutes>] [disable=<0|1>]"),
    ("read", "read                       - issue the host read command"),
    ("cap", "cap set <pct> | disable | override | get"),
    ("battext", "battext <verbs>            - run a debug-console line"),
    ("status", "status                     - print the console status snapshot"),
    ("help", "help                       - show this text"),
];

/// Virtual monotonic clock, microsecond resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(u64);

impl SimInstant {
    const fn start() -> Self {
        Self(0)
    }

    fn as_secs(self) -> u64 {
        self.0 / 1_000_000
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

impl TickInstant for SimInstant {
    fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Externally toggled power signals.
pub struct SimPower {
    pub present: bool,
    pub factory: bool,
}

impl PowerMonitor for SimPower {
    fn external_power_present(&mut self) -> bool {
        self.present
    }

    fn factory_mode_active(&mut self) -> bool {
        self.factory
    }
}

/// Fake charger remembering the last commands it received.
#[derive(Default)]
pub struct SimCharger {
    pub band: Option<SustainBand>,
    pub mode: Option<ChargeControlMode>,
}

impl SustainActuator for SimCharger {
    fn sustain(&mut self, band: SustainBand) {
        self.band = Some(band);
    }

    fn set_control_mode(&mut self, mode: ChargeControlMode) {
        self.mode = Some(mode);
    }
}

/// In-memory stand-in for the single persisted byte.
pub struct SimStore {
    pub byte: u8,
}

impl CapStore for SimStore {
    type Error = ();

    fn load(&mut self) -> Result<u8, ()> {
        Ok(self.byte)
    }

    fn store(&mut self, raw: u8) -> Result<(), ()> {
        self.byte = raw;
        Ok(())
    }
}

struct PrintRecorder<'a> {
    at: SimInstant,
    lines: &'a mut Vec<String>,
}

impl EventRecorder for PrintRecorder<'_> {
    fn record(&mut self, event: ExtenderEvent) {
        self.lines
            .push(format!("[t={}] {}", format_secs(self.at.as_secs()), describe(event)));
    }
}

type SimExtender = ChargeExtender<SimInstant, SimPower, SimCharger, SimStore>;

/// Interactive emulator session.
pub struct Session {
    extender: SimExtender,
    now: SimInstant,
}

impl Session {
    /// Creates a session at t=0, plugged in, with a blank cap byte.
    pub fn new() -> Self {
        let now = SimInstant::start();
        Self {
            extender: ChargeExtender::new(
                SimPower {
                    present: true,
                    factory: false,
                },
                SimCharger::default(),
                SimStore { byte: 0 },
                now,
            ),
            now,
        }
    }

    /// Executes one emulator command and returns the lines to print.
    pub fn handle_command(&mut self, input: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut parts = input.split_whitespace();
        let verb = parts.next().unwrap_or("");

        match verb {
            "help" => {
                for (_, text) in HELP_TOPICS {
                    out.push((*text).to_string());
                }
            }
            "tick" => {
                let count = parts.next().and_then(|arg| arg.parse().ok()).unwrap_or(1);
                self.run_ticks(count, &mut out);
                out.push(self.summary());
            }
            "advance" => match parts.next().map(parse_duration) {
                Some(Some(duration)) => {
                    self.run_ticks(duration.as_secs(), &mut out);
                    out.push(self.summary());
                }
                _ => out.push("Usage: advance <n><s|m|h|d>".to_string()),
            },
            "plug" => {
                self.extender.power_mut().present = true;
                out.push("external power connected".to_string());
            }
            "unplug" => {
                self.extender.power_mut().present = false;
                out.push("external power disconnected".to_string());
            }
            "factory" => match parts.next() {
                Some("on") => {
                    self.extender.power_mut().factory = true;
                    out.push("factory mode asserted".to_string());
                }
                Some("off") => {
                    self.extender.power_mut().factory = false;
                    out.push("factory mode cleared".to_string());
                }
                _ => out.push("Usage: factory on|off".to_string()),
            },
            "write" => self.host_write(parts, &mut out),
            "read" => match self.host_read() {
                Ok(status) => render_read(&status, &mut out),
                Err(error) => out.push(format!("error: {error}")),
            },
            "cap" => self.cap_command(parts, &mut out),
            "battext" => {
                let rest = input.strip_prefix("battext").unwrap_or("").trim();
                match console::parse_line(rest) {
                    Ok(command) => match command.apply(&mut self.extender, self.now) {
                        ConsoleReply::Updated => out.push("ok".to_string()),
                        ConsoleReply::Status(status) => render_console_status(&status, &mut out),
                    },
                    Err(error) => out.push(format!("error: {error}")),
                }
            }
            "status" => {
                let status = self.extender.console_status(self.now);
                render_console_status(&status, &mut out);
            }
            _ => out.push("Unrecognized command; try `help`.".to_string()),
        }

        out
    }

    fn run_ticks(&mut self, seconds: u64, out: &mut Vec<String>) {
        for _ in 0..seconds {
            self.now = self.now + Duration::from_secs(1);
            let mut recorder = PrintRecorder {
                at: self.now,
                lines: out,
            };
            self.extender.tick(self.now, &mut recorder);
        }
    }

    fn host_write<'a>(
        &mut self,
        fields: impl Iterator<Item = &'a str>,
        out: &mut Vec<String>,
    ) {
        let mut params = ExtenderParams {
            cmd: EXTENDER_WRITE_CMD,
            ..ExtenderParams::default()
        };

        for field in fields {
            match field.split_once('=') {
                Some(("trigger", value)) => {
                    params.trigger_days = value.parse().unwrap_or(0);
                }
                Some(("reset", value)) => {
                    params.reset_minutes = value.parse().unwrap_or(0);
                }
                Some(("disable", value)) => {
                    params.disable = matches!(value, "1" | "true" | "on");
                }
                _ => {
                    out.push(format!("ignoring unknown field `{field}`"));
                }
            }
        }

        match self.extender.handle_extender_command(&params, self.now) {
            Ok(_) => out.push("ok".to_string()),
            Err(error) => out.push(format!("error: {error}")),
        }
    }

    fn host_read(
        &mut self,
    ) -> Result<ExtenderStatus, extender_core::command::HostCommandError> {
        let params = ExtenderParams {
            cmd: EXTENDER_READ_CMD,
            ..ExtenderParams::default()
        };
        self.extender
            .handle_extender_command(&params, self.now)
            .map(|status| status.expect("read command always yields a status"))
    }

    fn cap_command<'a>(
        &mut self,
        mut parts: impl Iterator<Item = &'a str>,
        out: &mut Vec<String>,
    ) {
        let request = match parts.next() {
            Some("set") => match parts.next().and_then(|arg| arg.parse().ok()) {
                Some(percentage) => ChargeLimitRequest {
                    modes: ChargeLimitModes::SET_LIMIT,
                    max_percentage: percentage,
                },
                None => {
                    out.push("Usage: cap set <pct>".to_string());
                    return;
                }
            },
            Some("disable") => ChargeLimitRequest {
                modes: ChargeLimitModes::DISABLE,
                max_percentage: 0,
            },
            Some("override") => ChargeLimitRequest {
                modes: ChargeLimitModes::OVERRIDE,
                max_percentage: 0,
            },
            Some("get") => ChargeLimitRequest {
                modes: ChargeLimitModes::GET_LIMIT,
                max_percentage: 0,
            },
            _ => {
                out.push("Usage: cap set <pct> | disable | override | get".to_string());
                return;
            }
        };

        let mut recorder = PrintRecorder {
            at: self.now,
            lines: out,
        };
        match self.extender.handle_charge_limit_command(request, &mut recorder) {
            Ok(Some(byte)) => {
                let cap = ChargeCap::decode(byte);
                out.push(format!(
                    "cap byte 0x{byte:02X} (value {}{})",
                    cap.value(),
                    if cap.override_active() { ", override" } else { "" }
                ));
            }
            Ok(None) => out.push("ok".to_string()),
            Err(error) => out.push(format!("error: {error}")),
        }
    }

    fn summary(&self) -> String {
        let charger = self.extender.actuator();
        format!(
            "t={} stage={} band={}",
            format_secs(self.now.as_secs()),
            stage_label(self.extender.stage()),
            charger
                .band
                .map_or_else(|| "untouched".to_string(), format_band),
        )
    }
}

fn parse_duration(text: &str) -> Option<Duration> {
    let unit = text.chars().last()?;
    let count: u64 = text.get(..text.len() - 1)?.parse().ok()?;
    let scale = match unit {
        'd' => SECS_PER_DAY,
        'h' => SECS_PER_HOUR,
        'm' => SECS_PER_MINUTE,
        's' => 1,
        _ => return None,
    };
    Some(Duration::from_secs(count.saturating_mul(scale)))
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Normal => "normal",
        Stage::Mild => "mild",
        Stage::Deep => "deep",
    }
}

fn format_band(band: SustainBand) -> String {
    match band {
        SustainBand::Disengaged => "disengaged".to_string(),
        SustainBand::Engaged { lower, upper } => format!("{lower}-{upper}"),
    }
}

/// Renders seconds as `D:H:M:S`, mirroring the firmware console layout.
fn format_secs(total: u64) -> String {
    let days = total / SECS_PER_DAY;
    let hours = (total % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (total % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let seconds = total % SECS_PER_MINUTE;
    format!("{days}D:{hours}H:{minutes}M:{seconds}S")
}

fn describe(event: ExtenderEvent) -> String {
    match event {
        ExtenderEvent::CapApplied { cap, band } => {
            format!("user cap {cap}% applied, band {}", format_band(band))
        }
        ExtenderEvent::CapUnmanaged => "no user cap, charger unmanaged".to_string(),
        ExtenderEvent::StageEngaged { stage, band } => {
            format!("stage {} engaged, band {}", stage_label(stage), format_band(band))
        }
        ExtenderEvent::CycleReset => "off external power long enough, cycle reset".to_string(),
        ExtenderEvent::Halted => "halted (disabled or factory mode)".to_string(),
        ExtenderEvent::StoreFailed => "cap store access failed".to_string(),
    }
}

fn render_read(status: &ExtenderStatus, out: &mut Vec<String>) {
    out.push(format!(
        "stage={} disabled={}",
        status.current_stage.ordinal(),
        status.disabled
    ));
    out.push(format!(
        "trigger: {} days, fires in {}",
        status.trigger_days,
        format_secs(status.trigger_remaining.as_secs())
    ));
    out.push(format!(
        "reset: {} minutes, fires in {}",
        status.reset_minutes,
        format_secs(status.reset_remaining.as_secs())
    ));
}

fn render_console_status(status: &ConsoleStatus, out: &mut Vec<String>) {
    out.push(format!(
        "Battery extender {}",
        if status.disabled { "disabled" } else { "enabled" }
    ));
    out.push(format!(
        "\tTrigger: {}",
        format_secs(status.trigger_interval.as_secs())
    ));
    out.push(format!(
        "\tReset: {}",
        format_secs(status.reset_interval.as_secs())
    ));
    out.push(format!("\tCurrent stage: {}", stage_label(status.stage)));
    if let Some(remaining) = status.stage1_remaining {
        out.push(format!(
            "\t - Stage 1 expires in: {}",
            format_secs(remaining.as_secs())
        ));
    }
    if let Some(remaining) = status.stage2_remaining {
        out.push(format!(
            "\t - Stage 2 expires in: {}",
            format_secs(remaining.as_secs())
        ));
    }
    if let Some(remaining) = status.reset_remaining {
        out.push(format!(
            "\t - Reset expires in: {}",
            format_secs(remaining.as_secs())
        ));
    }
    out.push(format!(
        "\tSustainer percentage: lower {}, upper {}",
        status.sustain_lower, status.sustain_upper
    ));
    match status.cap {
        Some(cap) if cap.override_active() => {
            out.push(format!("\tUser charge limit: {} (override)", cap.value()));
        }
        Some(cap) => out.push(format!("\tUser charge limit: {}", cap.value())),
        None => out.push("\tUser charge limit: not read yet".to_string()),
    }
}
