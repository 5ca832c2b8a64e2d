//! Interactive menu shown when no subcommand is given

use crate::commands::Command;
use crate::error::{AppError, Result};
use chrono::NaiveDate;
use std::io::{BufRead, Write};

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<String> {
    write!(output, "{}", label)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(AppError::Validation("No input".to_string()));
    }
    Ok(line.trim().to_string())
}

fn prompt_date<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<NaiveDate> {
    let raw = prompt(input, output, label)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

/// Ask which indexing run to perform
pub fn choose_command<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Command> {
    writeln!(output, "1. Full Indexing")?;
    writeln!(output, "2. Incremental Indexing")?;
    writeln!(output, "3. Targeted Indexing")?;
    writeln!(output, "4. Fundamentals Sync")?;

    let choice = prompt(input, output, "Choose the indexing type (1/2/3/4): ")?;
    match choice.as_str() {
        "1" => Ok(Command::Full),
        "2" => Ok(Command::Incremental { date: None }),
        "3" => {
            let ticker = prompt(input, output, "Enter Ticker: ")?;
            if ticker.is_empty() {
                return Err(AppError::Validation("Ticker is required".to_string()));
            }
            let start = prompt_date(input, output, "Enter Start Date (YYYY-MM-DD): ")?;
            let end = prompt_date(input, output, "Enter End Date (YYYY-MM-DD): ")?;
            Ok(Command::Targeted { ticker, start, end })
        }
        "4" => Ok(Command::Fundamentals { ticker: None }),
        other => Err(AppError::Validation(format!("Invalid choice '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(script: &str) -> Result<Command> {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        choose_command(&mut input, &mut output)
    }

    #[test]
    fn test_simple_choices() {
        assert!(matches!(run("1\n"), Ok(Command::Full)));
        assert!(matches!(run("2\n"), Ok(Command::Incremental { date: None })));
        assert!(matches!(run("4\n"), Ok(Command::Fundamentals { ticker: None })));
    }

    #[test]
    fn test_targeted_prompts() {
        let command = run("3\nTCS.NS\n2024-01-01\n2024-03-31\n").unwrap();
        match command {
            Command::Targeted { ticker, start, end } => {
                assert_eq!(ticker, "TCS.NS");
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
                assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(run("9\n").is_err());
        assert!(run("").is_err());
        assert!(run("3\nTCS.NS\n01/01/2024\n").is_err());
    }
}
