//! Interactive prompts for the configuration and task files.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

use syncwarden_common::OrchestratorConfig;
use syncwarden_sync::{TaskFile, DEFAULT_SSH_PORT};

/// Line-oriented question/answer session over any reader and writer.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Ask once and return the trimmed answer.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read answer")?;
        if read == 0 {
            bail!("Input ended before all questions were answered");
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the answer parses, using `default` for an empty answer.
    pub fn ask_number<T: std::str::FromStr>(&mut self, question: &str, default: T) -> Result<T> {
        loop {
            let answer = self.ask(question)?;
            if answer.is_empty() {
                return Ok(default);
            }
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "Invalid input. Please try again.")?,
            }
        }
    }

    pub fn ask_bool(&mut self, question: &str) -> Result<bool> {
        Ok(parse_bool(&self.ask(question)?))
    }
}

/// Loose yes/no parsing: `true`, `1`, `t`, `y` and `yes` mean yes.
pub fn parse_bool(answer: &str) -> bool {
    matches!(
        answer.to_lowercase().as_str(),
        "true" | "1" | "t" | "y" | "yes"
    )
}

/// Collect the orchestrator configuration.
pub fn ask_config<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<OrchestratorConfig> {
    let defaults = OrchestratorConfig::default();

    let send_heartbeat = prompter.ask_bool("Should a heartbeat signal be sent? (True/False): ")?;
    let heartbeat_link = prompter.ask("Enter heartbeat link: ")?;
    let num_threads = prompter.ask_number(
        "Enter number of threads (press Enter for default value 1): ",
        defaults.num_threads,
    )?;
    let max_attempts = prompter.ask_number(
        "Enter attempts per task (press Enter for default value 5): ",
        defaults.max_attempts,
    )?;
    let backoff_seconds = prompter.ask_number(
        "Enter seconds to wait between attempts (press Enter for default value 30): ",
        defaults.backoff_seconds,
    )?;
    let mail = prompter.ask("Enter mail command, e.g. 'python3 mail_sender.py' (press Enter to disable): ")?;
    let mail_command = if mail.is_empty() {
        None
    } else {
        Some(mail.split_whitespace().map(String::from).collect())
    };

    let config = OrchestratorConfig {
        send_heartbeat,
        heartbeat_link,
        num_threads,
        max_attempts,
        backoff_seconds,
        expect_timeout_seconds: None,
        mail_command,
    };
    config.validate()?;
    Ok(config)
}

/// Collect a task descriptor and the file name to store it under.
pub fn ask_task<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<(String, TaskFile)> {
    let server_address = prompter.ask("Enter the server address: ")?;
    let port = prompter.ask_number(
        "Enter the port number (press Enter for default port 22): ",
        DEFAULT_SSH_PORT,
    )?;
    let username = prompter.ask("Enter the username: ")?;
    let private_key_name =
        prompter.ask("Enter the name of the private key (without the file extension): ")?;
    let remote_folder_path = prompter.ask("Enter the remote (source) path to the folder: ")?;
    let local_folder_path = prompter.ask("Enter the local (destination) path to the folder: ")?;
    let delete_remote_files =
        prompter.ask_bool("Do you want to delete remote files? (True/False): ")?;

    let name = prompter.ask(
        "Enter the filename for the configuration file (press Enter to use the default name): ",
    )?;
    let name = if name.is_empty() {
        format!("{}_{}", server_address, username)
    } else {
        name
    };

    let task = TaskFile {
        server_address: Some(server_address),
        port: Some(port),
        username: Some(username),
        private_key_name: Some(private_key_name),
        remote_folder_path: Some(remote_folder_path),
        local_folder_path: Some(local_folder_path),
        delete_remote_files: Some(delete_remote_files),
    };
    Ok((name, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(answers: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(answers.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("Yes"));
        assert!(parse_bool("T"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_config_defaults_on_empty_answers() {
        let mut p = prompter("no\n\n\n\n\n\n");
        let config = ask_config(&mut p).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_config_reprompts_invalid_number() {
        let mut p = prompter("true\nhttps://hc-ping.com/uuid\nmany\n4\n3\n10\npython3 mail_sender.py\n");
        let config = ask_config(&mut p).unwrap();

        assert!(config.send_heartbeat);
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_seconds, 10);
        assert_eq!(
            config.mail_command,
            Some(vec!["python3".to_string(), "mail_sender.py".to_string()])
        );

        let output = String::from_utf8(p.output).unwrap();
        assert!(output.contains("Invalid input. Please try again."));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut p = prompter("no\n\n0\n\n\n\n");
        assert!(ask_config(&mut p).is_err());
    }

    #[test]
    fn test_task_with_default_name_and_port() {
        let mut p = prompter("nas.local\n\nbackup\nnas_key\n/volume1/docs\n/srv/docs\nno\n\n");
        let (name, task) = ask_task(&mut p).unwrap();

        assert_eq!(name, "nas.local_backup");
        assert_eq!(task.port, Some(22));
        assert_eq!(task.delete_remote_files, Some(false));
        assert_eq!(task.local_folder_path.as_deref(), Some("/srv/docs"));
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut p = prompter("nas.local\n");
        assert!(ask_task(&mut p).is_err());
    }
}
