//! Line-oriented operator console on stdin.

use std::sync::Arc;

use satrig_core::{
    LinkHealth, OperatorCommand, SatElements, TrackingState, TrackingStatus,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

const HELP: &str = "\
commands:
  arm     (a)  re-arm the configured satellite
  pause   (p)  hold tuning commands, keep computing
  resume  (r)  resume tuning after a pause
  cancel  (c)  give up on the current pass, stay armed
  disarm  (d)  drop the target entirely
  status  (s)  print the tracking snapshot
  help    (h)  this text
  quit    (q)  leave the console";

/// One line of operator input, decoded.
#[derive(Debug, Clone)]
pub enum ConsoleAction {
    Arm,
    Operator(OperatorCommand),
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl ConsoleAction {
    /// Single-letter aliases cover what an operator can type one-handed
    /// mid-pass. Blank lines decode to nothing.
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim().to_ascii_lowercase();
        match word.as_str() {
            "" => None,
            "arm" | "a" => Some(Self::Arm),
            "pause" | "p" => Some(Self::Operator(OperatorCommand::Pause)),
            "resume" | "r" => Some(Self::Operator(OperatorCommand::Resume)),
            "cancel" | "c" => Some(Self::Operator(OperatorCommand::Cancel)),
            "disarm" | "d" => Some(Self::Operator(OperatorCommand::Disarm)),
            "status" | "s" => Some(Self::Status),
            "help" | "h" | "?" => Some(Self::Help),
            "quit" | "q" | "exit" => Some(Self::Quit),
            _ => Some(Self::Unknown(word)),
        }
    }
}

/// Read operator input until EOF or `quit`, forwarding commands to the
/// tracking controller.
pub async fn run_console(
    target: Arc<SatElements>,
    commands: mpsc::Sender<OperatorCommand>,
    status: watch::Receiver<TrackingStatus>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("satrig console ready, 'help' lists commands");
    while let Some(line) = lines.next_line().await? {
        let Some(action) = ConsoleAction::parse(&line) else {
            continue;
        };
        let command = match action {
            ConsoleAction::Arm => OperatorCommand::Arm(Arc::clone(&target)),
            ConsoleAction::Operator(cmd) => cmd,
            ConsoleAction::Status => {
                println!("{}", render_status(&status.borrow()));
                continue;
            }
            ConsoleAction::Help => {
                println!("{HELP}");
                continue;
            }
            ConsoleAction::Quit => break,
            ConsoleAction::Unknown(word) => {
                println!("unknown command '{word}', 'help' lists commands");
                continue;
            }
        };
        if commands.send(command).await.is_err() {
            // controller is gone, nothing left to drive
            break;
        }
    }
    Ok(())
}

pub fn render_status(status: &TrackingStatus) -> String {
    let state = match status.state {
        TrackingState::Idle => "idle",
        TrackingState::Tracking => "tracking",
        TrackingState::Paused => "paused",
    };
    let mut out = format!("state: {state}");
    if status.link_health == LinkHealth::Degraded {
        out.push_str(" (rig link degraded)");
    }
    if let Some(armed) = &status.armed {
        out.push_str(&format!("\narmed: {} (NORAD {})", armed.name, armed.norad_id));
    }
    if let Some(secs) = status.next_aos_in_s {
        out.push_str(&format!("\nnext AOS in {}", format_countdown(secs)));
    }
    if let Some(s) = &status.session {
        out.push_str(&format!(
            "\npass: {} until {} (peak {:.1} deg)",
            s.satellite,
            s.window.los.format("%H:%M:%SZ"),
            s.window.max_elevation_deg,
        ));
        if let Some(d) = &s.last_doppler {
            out.push_str(&format!(
                "\ndoppler: down {} up {} at {:+.0} m/s",
                fmt_mhz(d.downlink_hz.round() as u64),
                fmt_mhz(d.uplink_hz.round() as u64),
                d.range_rate_m_s,
            ));
        }
        if let Some(hz) = s.applied_downlink_hz {
            out.push_str(&format!("\nrig downlink: {}", fmt_mhz(hz)));
        }
        if let Some(hz) = s.applied_uplink_hz {
            out.push_str(&format!("\nrig uplink: {}", fmt_mhz(hz)));
        }
        out.push_str(&format!(
            "\nticks {} commands {} failures {}",
            s.ticks, s.commands_sent, s.command_failures,
        ));
    }
    out
}

pub fn fmt_mhz(hz: u64) -> String {
    format!("{:.6} MHz", hz as f64 / 1e6)
}

pub fn format_countdown(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use satrig_core::{PassWindow, TrackingSession};

    #[test]
    fn test_parse_full_words() {
        assert!(matches!(
            ConsoleAction::parse("pause"),
            Some(ConsoleAction::Operator(OperatorCommand::Pause))
        ));
        assert!(matches!(
            ConsoleAction::parse("resume"),
            Some(ConsoleAction::Operator(OperatorCommand::Resume))
        ));
        assert!(matches!(
            ConsoleAction::parse("cancel"),
            Some(ConsoleAction::Operator(OperatorCommand::Cancel))
        ));
        assert!(matches!(
            ConsoleAction::parse("disarm"),
            Some(ConsoleAction::Operator(OperatorCommand::Disarm))
        ));
        assert!(matches!(ConsoleAction::parse("arm"), Some(ConsoleAction::Arm)));
        assert!(matches!(ConsoleAction::parse("status"), Some(ConsoleAction::Status)));
        assert!(matches!(ConsoleAction::parse("quit"), Some(ConsoleAction::Quit)));
    }

    #[test]
    fn test_parse_single_letter_aliases() {
        assert!(matches!(
            ConsoleAction::parse("p"),
            Some(ConsoleAction::Operator(OperatorCommand::Pause))
        ));
        assert!(matches!(
            ConsoleAction::parse("c"),
            Some(ConsoleAction::Operator(OperatorCommand::Cancel))
        ));
        assert!(matches!(ConsoleAction::parse("s"), Some(ConsoleAction::Status)));
        assert!(matches!(ConsoleAction::parse("q"), Some(ConsoleAction::Quit)));
    }

    #[test]
    fn test_parse_is_case_and_whitespace_insensitive() {
        assert!(matches!(
            ConsoleAction::parse("  PAUSE  "),
            Some(ConsoleAction::Operator(OperatorCommand::Pause))
        ));
    }

    #[test]
    fn test_parse_blank_and_unknown() {
        assert!(ConsoleAction::parse("   ").is_none());
        match ConsoleAction::parse("warble") {
            Some(ConsoleAction::Unknown(word)) => assert_eq!(word, "warble"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_render_idle_status() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rendered = render_status(&TrackingStatus {
            state: TrackingState::Idle,
            link_health: LinkHealth::Ok,
            armed: None,
            session: None,
            next_aos_in_s: None,
            updated_at: at,
        });
        assert_eq!(rendered, "state: idle");
    }

    #[test]
    fn test_render_tracking_status_shows_rig_state() {
        let aos = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let window = PassWindow {
            norad_id: 27607,
            satellite: "SO-50".to_string(),
            aos,
            tca: aos + chrono::Duration::minutes(5),
            los: aos + chrono::Duration::minutes(10),
            max_elevation_deg: 38.2,
            aos_azimuth_deg: 200.0,
            tca_azimuth_deg: 270.0,
            los_azimuth_deg: 340.0,
            clipped_aos: false,
            clipped_los: false,
        };
        let mut session = TrackingSession::new(window, aos);
        session.applied_downlink_hz = Some(436_797_500);
        let rendered = render_status(&TrackingStatus {
            state: TrackingState::Tracking,
            link_health: LinkHealth::Degraded,
            armed: None,
            session: Some(session),
            next_aos_in_s: None,
            updated_at: aos,
        });
        assert!(rendered.contains("state: tracking (rig link degraded)"));
        assert!(rendered.contains("pass: SO-50 until 10:10:00Z"));
        assert!(rendered.contains("rig downlink: 436.797500 MHz"));
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(42), "42s");
        assert_eq!(format_countdown(200), "3m 20s");
        assert_eq!(format_countdown(5025), "1h 23m 45s");
        assert_eq!(format_countdown(-5), "0s");
    }
}
