//! REPL – Read-Eval-Print Loop for the Mantis operator shell.
//!
//! Supported slash-commands:
//!   /help                    – show this list
//!   /status                  – pose, motion lock and config path
//!   /locate                  – detect the target and localise it
//!   /consensus [min]         – majority-vote a target position
//!   /align <heading>         – turn in place to a heading (rad)
//!   /face <x> <y> | <name>   – turn toward a point or a named position
//!   /face                    – turn toward the detected target
//!   /goto <name>             – navigate to a named position
//!   /approach [threshold]    – locate, then coarse-approach the target
//!   /visual [threshold]      – visual-servo approach on the range feed
//!   /shift <standoff>        – correct the standoff from the depth image
//!   /walk <units>            – one stepping pulse forward (negative: back)
//!   /turn <units>            – one turning pulse (negative: clockwise)
//!   /quit | /exit            – gracefully exit the CLI

use colored::Colorize;
use std::fmt::Debug;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mantis_control::{ControlResult, Controller, TerminalStatus};
use mantis_hal::SimRobot;

use crate::config;

const DEFAULT_VISUAL_THRESHOLD: f32 = 0.2;
const DEFAULT_CONSENSUS_MIN: usize = 5;

/// A parsed slash-command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Locate,
    Consensus(usize),
    Align(f32),
    FacePoint(f32, f32),
    FaceNamed(String),
    FaceTarget,
    Goto(String),
    Approach(Option<f32>),
    Visual(f32),
    Shift(f32),
    Walk(f32),
    Turn(f32),
    Quit,
}

impl Command {
    /// Parse one input line.  The error is the message shown to the operator.
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let cmd = match (head, args.as_slice()) {
            ("/help", []) => Command::Help,
            ("/status", []) => Command::Status,
            ("/locate", []) => Command::Locate,
            ("/consensus", []) => Command::Consensus(DEFAULT_CONSENSUS_MIN),
            ("/consensus", [n]) => Command::Consensus(parse_arg(n, "min count")?),
            ("/align", [h]) => Command::Align(parse_arg(h, "heading")?),
            ("/face", []) => Command::FaceTarget,
            ("/face", [x, y]) => Command::FacePoint(parse_arg(x, "x")?, parse_arg(y, "y")?),
            ("/face", [name]) => Command::FaceNamed(name.to_string()),
            ("/goto", [name]) => Command::Goto(name.to_string()),
            ("/approach", []) => Command::Approach(None),
            ("/approach", [t]) => Command::Approach(Some(parse_arg(t, "threshold")?)),
            ("/visual", []) => Command::Visual(DEFAULT_VISUAL_THRESHOLD),
            ("/visual", [t]) => Command::Visual(parse_arg(t, "threshold")?),
            ("/shift", [s]) => Command::Shift(parse_arg(s, "standoff")?),
            ("/walk", [u]) => Command::Walk(parse_arg(u, "units")?),
            ("/turn", [u]) => Command::Turn(parse_arg(u, "units")?),
            ("/quit" | "/exit", []) => Command::Quit,
            (
                "/help" | "/status" | "/locate" | "/consensus" | "/align" | "/face" | "/goto"
                | "/approach" | "/visual" | "/shift" | "/walk" | "/turn" | "/quit" | "/exit",
                _,
            ) => return Err(format!("wrong arguments for {head}; see /help")),
            (other, _) => return Err(format!("unknown command '{other}'")),
        };
        Ok(cmd)
    }
}

fn parse_arg<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("'{raw}' is not a valid {what}"))
}

/// What Ctrl-C does in the current shell state.
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    /// Cancel the running command, named for the operator.
    Cancel(String),
    /// Nothing is running: leave the shell.
    Exit,
}

impl Interrupt {
    /// `busy` is set while a command executes; `holder` is the motion-lock
    /// owner.  Commands that take no lock (`/locate`, `/consensus`) are still
    /// cancelled rather than killing the shell.
    pub fn decide(busy: bool, holder: Option<String>) -> Interrupt {
        match (busy, holder) {
            (_, Some(operation)) => Interrupt::Cancel(operation),
            (true, None) => Interrupt::Cancel("command".to_string()),
            (false, None) => Interrupt::Exit,
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
/// `busy` is raised for the duration of every command.
pub fn run(ctl: &Controller<SimRobot>, shutdown: Arc<AtomicBool>, busy: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "mantis>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let cmd = match Command::parse(input) {
            Ok(cmd) => cmd,
            Err(msg) => {
                println!("{} {}. Type {} for available commands.", "Error:".red(), msg, "/help".bold());
                continue;
            }
        };

        if cmd == Command::Quit {
            println!("{}", "Goodbye.".green());
            shutdown.store(true, Ordering::SeqCst);
            break;
        }

        // A Ctrl-C aimed at the previous operation must not cancel this one.
        ctl.cancel_token().reset();
        busy.store(true, Ordering::SeqCst);
        execute(ctl, cmd);
        busy.store(false, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn execute(ctl: &Controller<SimRobot>, cmd: Command) {
    match cmd {
        Command::Help => cmd_help(),
        Command::Status => cmd_status(ctl),
        Command::Locate => report(ctl.locate_target()),
        Command::Consensus(min) => report(ctl.gather_consensus(min)),
        Command::Align(heading) => report(ctl.align_to(heading)),
        Command::FacePoint(x, y) => report(ctl.face_point(x, y)),
        Command::FaceNamed(name) => report(ctl.face_named(&name)),
        Command::FaceTarget => report(ctl.face_target()),
        Command::Goto(name) => report(ctl.goto_named(&name)),
        Command::Approach(threshold) => cmd_approach(ctl, threshold),
        Command::Visual(threshold) => report(ctl.visual_approach(threshold)),
        Command::Shift(standoff) => report(ctl.shift(standoff)),
        Command::Walk(units) => report(ctl.mini_walk(units, false)),
        Command::Turn(units) => report(ctl.mini_turn(units)),
        Command::Quit => {}
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Mantis Commands".bold().underline());
    println!("  {}              – pose, motion lock and config path", "/status".bold().cyan());
    println!("  {}              – detect and localise the target", "/locate".bold().cyan());
    println!("  {}     – majority-vote the target position", "/consensus [min]".bold().cyan());
    println!("  {}     – turn in place to a heading (rad)", "/align <heading>".bold().cyan());
    println!("  {} – turn toward a point or named position", "/face <x> <y>|<name>".bold().cyan());
    println!("  {}                – turn toward the detected target", "/face".bold().cyan());
    println!("  {}         – navigate to a named position", "/goto <name>".bold().cyan());
    println!("  {} – locate, then coarse approach", "/approach [threshold]".bold().cyan());
    println!("  {}   – visual-servo approach", "/visual [threshold]".bold().cyan());
    println!("  {}    – correct the standoff distance", "/shift <standoff>".bold().cyan());
    println!("  {}  – single stepping pulse", "/walk|/turn <units>".bold().cyan());
    println!("  {}         – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
    println!("  Press {} to cancel a running operation.", "Ctrl-C".bold());
    println!();
}

fn cmd_status(ctl: &Controller<SimRobot>) {
    let robot = ctl.robot();
    let pose = robot.current_pose();
    println!("{}", "Status".bold().underline());
    println!(
        "  Pose        : x={:.3} y={:.3} heading={:.3}",
        pose.x, pose.y, pose.heading
    );
    println!(
        "  Motion lock : {}",
        match ctl.motion_lock().holder() {
            Some(op) => op.yellow().to_string(),
            None => "free".green().to_string(),
        }
    );
    println!("  Sim clock   : {:.2} s", robot.clock());
    println!("  Stops sent  : {}", robot.stop_count());
    println!("  Target      : {}", ctl.config().target_label.bold());
    println!("  Config      : {}", config::config_path().display());
}

fn cmd_approach(ctl: &Controller<SimRobot>, threshold: Option<f32>) {
    let threshold = threshold.unwrap_or(ctl.config().approach_near_threshold);
    match ctl.locate_target() {
        Ok(target) => {
            println!(
                "  Target at x={:.3} y={:.3} in {}",
                target.base_point.x,
                target.base_point.y,
                ctl.config().base_frame
            );
            report(ctl.approach(target.base_point, threshold));
        }
        Err(e) => report::<()>(Err(e)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Print the terminal status of an operation and its report or error.
fn report<T: Debug>(result: ControlResult<T>) {
    let status = TerminalStatus::of(&result);
    let label = match status {
        TerminalStatus::Converged => status.to_string().green().bold(),
        TerminalStatus::NoTarget => status.to_string().yellow().bold(),
        TerminalStatus::Failed => status.to_string().red().bold(),
    };
    match result {
        Ok(value) => println!("  {} {:?}", label, value),
        Err(e) => println!("  {} {}", label, e),
    }
}
