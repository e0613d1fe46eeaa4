//! Interactive command console

use crate::console::LogConsole;
use crate::controller::Command;
use kozy_core::{ModuleEntry, ModuleId, ModuleKind, StreamConfig, StreamConfigError, UsbIdentity};
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  detect                      re-run device detection
  connect                     handshake with the microcontroller
  start [WxH FPS]             start streaming
  stop                        stop streaming
  set WxH FPS                 change stream settings
  save | load                 persist or reload settings
  init servo                  initialize servo drives
  modules                     list registered modules
  add camera|servo|pico ID LABEL
  remove ID
  log [N]                     show the last N console lines
  help
  quit";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShellError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid stream settings: {0}")]
    Stream(#[from] StreamConfigError),
    #[error("invalid number: {0}")]
    Number(String),
}

/// What a line of input asks for
#[derive(Debug)]
pub enum ShellAction {
    Send(Vec<Command>),
    ShowLog(usize),
    Help,
    Quit,
    Nothing,
}

fn parse_stream(resolution: &str, fps: &str) -> Result<StreamConfig, ShellError> {
    let fps = fps
        .parse::<u32>()
        .map_err(|_| ShellError::Number(fps.to_string()))?;
    Ok(StreamConfig::parse(resolution, fps)?)
}

pub fn parse_line(line: &str) -> Result<ShellAction, ShellError> {
    let line = line.trim();
    let words: Vec<&str> = line.split_whitespace().collect();

    let action = match words.as_slice() {
        [] => ShellAction::Nothing,
        ["help"] | ["?"] => ShellAction::Help,
        ["quit"] | ["exit"] => ShellAction::Quit,
        ["detect"] => ShellAction::Send(vec![Command::DetectDevices]),
        ["connect"] => ShellAction::Send(vec![Command::ConnectMicrocontroller { timeout: None }]),
        ["start"] => ShellAction::Send(vec![Command::StartStream]),
        ["start", resolution, fps] => ShellAction::Send(vec![
            Command::SetStream(parse_stream(resolution, fps)?),
            Command::StartStream,
        ]),
        ["start", ..] => return Err(ShellError::Usage("start [WxH FPS]")),
        ["stop"] => ShellAction::Send(vec![Command::StopStream]),
        ["set", resolution, fps] => {
            ShellAction::Send(vec![Command::SetStream(parse_stream(resolution, fps)?)])
        }
        ["set", ..] => return Err(ShellError::Usage("set WxH FPS")),
        ["save"] => ShellAction::Send(vec![Command::SaveConfig]),
        ["load"] => ShellAction::Send(vec![Command::LoadConfig]),
        ["init", "servo"] | ["init", "servos"] => ShellAction::Send(vec![Command::InitServos]),
        ["modules"] | ["status"] => ShellAction::Send(vec![Command::ListModules]),
        ["add", kind, id, label @ ..] if !label.is_empty() => {
            let kind = match *kind {
                "camera" => ModuleKind::DepthCamera {
                    stream: StreamConfig::default(),
                    streaming: false,
                },
                "servo" => ModuleKind::ServoDrives { initialized: false },
                "pico" => ModuleKind::Microcontroller {
                    identity: UsbIdentity::PICO_MICROPYTHON,
                    code: None,
                },
                _ => return Err(ShellError::Usage("add camera|servo|pico ID LABEL")),
            };
            let entry = ModuleEntry::new(ModuleId::new(id), label.join(" "), kind);
            ShellAction::Send(vec![Command::AddModule(entry)])
        }
        ["add", ..] => return Err(ShellError::Usage("add camera|servo|pico ID LABEL")),
        ["remove", id] => ShellAction::Send(vec![Command::RemoveModule(ModuleId::new(id))]),
        ["log"] => ShellAction::ShowLog(20),
        ["log", n] => ShellAction::ShowLog(
            n.parse()
                .map_err(|_| ShellError::Number(n.to_string()))?,
        ),
        // Anything else goes to the console as a free-form command
        _ => ShellAction::Send(vec![Command::Execute(line.to_string())]),
    };
    Ok(action)
}

/// Blocking stdin reads live on their own thread so they never hold up
/// runtime shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break;
                }
            }
        }
    });
    rx
}

/// Read commands from stdin until quit, EOF, or Ctrl-C, then request shutdown
pub async fn run(commands: mpsc::Sender<Command>, console: Arc<LogConsole>) {
    let mut input = spawn_stdin_reader();
    println!("Type 'help' for commands");

    loop {
        let line = tokio::select! {
            line = input.recv() => line,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        match parse_line(&line) {
            Ok(ShellAction::Send(batch)) => {
                for command in batch {
                    if commands.send(command).await.is_err() {
                        return;
                    }
                }
            }
            Ok(ShellAction::ShowLog(n)) => {
                let lines = console.tail(n);
                for entry in &lines {
                    println!("{}", entry);
                }
                println!("({} of {} lines)", lines.len(), console.len());
            }
            Ok(ShellAction::Help) => println!("{}", HELP),
            Ok(ShellAction::Quit) => break,
            Ok(ShellAction::Nothing) => {}
            Err(e) => println!("{}", e),
        }
    }

    let _ = commands.send(Command::Shutdown).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(line: &str) -> Vec<Command> {
        match parse_line(line).unwrap() {
            ShellAction::Send(batch) => batch,
            other => panic!("expected commands, got {:?}", other),
        }
    }

    #[test]
    fn test_known_commands() {
        assert!(matches!(&commands("detect")[..], [Command::DetectDevices]));
        assert!(matches!(
            &commands("connect")[..],
            [Command::ConnectMicrocontroller { timeout: None }]
        ));
        assert!(matches!(&commands("  stop ")[..], [Command::StopStream]));
        assert!(matches!(&commands("init servo")[..], [Command::InitServos]));
        assert!(matches!(parse_line("quit").unwrap(), ShellAction::Quit));
        assert!(matches!(parse_line("").unwrap(), ShellAction::Nothing));
        assert!(matches!(parse_line("log 5").unwrap(), ShellAction::ShowLog(5)));
    }

    #[test]
    fn test_start_with_settings() {
        let batch = commands("start 640x480 15");
        assert_eq!(batch.len(), 2);
        match &batch[0] {
            Command::SetStream(config) => {
                assert_eq!(*config, StreamConfig::new(640, 480, 15).unwrap())
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(matches!(batch[1], Command::StartStream));
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(matches!(
            parse_line("set 640by480 15"),
            Err(ShellError::Stream(_))
        ));
        assert_eq!(
            parse_line("set 640x480 fast").unwrap_err(),
            ShellError::Number("fast".to_string())
        );
        assert!(matches!(parse_line("start 640x480"), Err(ShellError::Usage(_))));
    }

    #[test]
    fn test_add_module() {
        match &commands("add servo arm Arm Servos")[..] {
            [Command::AddModule(entry)] => {
                assert_eq!(entry.id, ModuleId::new("arm"));
                assert_eq!(entry.label, "Arm Servos");
                assert!(matches!(entry.kind, ModuleKind::ServoDrives { .. }));
            }
            other => panic!("unexpected commands {:?}", other),
        }
        assert!(parse_line("add lidar front Front Lidar").is_err());
        assert!(parse_line("add servo arm").is_err());
    }

    #[test]
    fn test_unknown_text_is_executed() {
        match &commands("move x 10")[..] {
            [Command::Execute(text)] => assert_eq!(text, "move x 10"),
            other => panic!("unexpected commands {:?}", other),
        }
    }
}
