//! Operator commands typed while a roster is on screen.

use checkin_core::WorkflowCommand;
use shared::domain::AttendanceFlag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    Help,
    Show,
    Workflow(WorkflowCommand),
}

pub const HELP: &str = "\
commands:
  toggle <row> <flag>        flip one checkbox (row is 1-based)
  set <row> <flag> on|off    set one checkbox
  submit                     push the table to the server
  next                       discard this team and scan the next one
  show                       print the table again
  quit                       exit
flags: check-in refreshment-1 round-1 dinner refreshment-2 round-2 refreshment-3 round-3 check-out
       (backend column names and column numbers 1-9 also work)";

/// Commands honoured even while the scanner owns stdin.
pub fn is_global(line: &str) -> bool {
    matches!(
        parse(line),
        Ok(Input::Quit) | Ok(Input::Help)
    )
}

pub fn parse(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let input = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("quit" | "exit" | "q", []) => Input::Quit,
        ("help" | "?", []) => Input::Help,
        ("show" | "table", []) => Input::Show,
        ("submit" | "save", []) => Input::Workflow(WorkflowCommand::Submit),
        ("next" | "scan", []) => Input::Workflow(WorkflowCommand::ScanNext),
        ("toggle" | "t", [row, flag]) => Input::Workflow(WorkflowCommand::ToggleCheckbox {
            row: parse_row(row)?,
            flag: parse_flag(flag)?,
        }),
        ("set", [row, flag, value]) => Input::Workflow(WorkflowCommand::SetCheckbox {
            row: parse_row(row)?,
            flag: parse_flag(flag)?,
            checked: parse_switch(value)?,
        }),
        _ => return Err(format!("unrecognised command '{line}'; type `help`")),
    };
    Ok(input)
}

fn parse_row(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(row) if row >= 1 => Ok(row - 1),
        _ => Err(format!("row must be a number starting at 1, got '{raw}'")),
    }
}

fn parse_flag(raw: &str) -> Result<AttendanceFlag, String> {
    raw.parse::<AttendanceFlag>().map_err(|err| err.to_string())
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "yes" | "1" | "true" => Ok(true),
        "off" | "no" | "0" | "false" => Ok(false),
        _ => Err(format!("expected on or off, got '{raw}'")),
    }
}
