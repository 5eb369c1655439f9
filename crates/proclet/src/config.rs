//! Spawn configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Configuration for spawning a child process.
///
/// The pipe layout is fixed: the child's stdin and stdout are piped, stderr is
/// inherited from the caller. The stdio specification is assembled fresh for
/// every spawn.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program to execute
    pub program: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment for the child (None = inherit the caller's environment,
    /// Some = use exactly this mapping)
    pub env: Option<HashMap<String, String>>,
    /// User to run the child as, via `sudo -n -u <user> --` (None = caller)
    pub user: Option<String>,
}

impl SpawnConfig {
    /// Create a new spawn configuration
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            working_dir: None,
            env: None,
            user: None,
        }
    }

    /// Build a configuration from a whitespace-separated command line.
    ///
    /// No shell quoting is interpreted; the first word is the program, the
    /// rest are arguments.
    pub fn from_line(line: &str) -> Self {
        let mut words = line.split_whitespace().map(str::to_owned);
        let program = words.next().unwrap_or_default();
        Self {
            program,
            args: words.collect(),
            working_dir: None,
            env: None,
            user: None,
        }
    }

    /// Set program arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable. The first call switches the child from an
    /// inherited environment to exactly the variables given here.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the whole child environment
    pub fn envs(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Run the child as a different user (non-interactive `sudo`)
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// The command line this configuration will run, for display and errors
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    pub(crate) fn build_command(&self) -> Command {
        let mut cmd = match &self.user {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.args(["-n", "-u", user, "--"]);
                cmd.arg(&self.program);
                cmd.args(&self.args);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.program);
                cmd.args(&self.args);
                cmd
            }
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(env) = &self.env {
            cmd.env_clear();
            cmd.envs(env);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        // stderr stays inherited
        cmd
    }
}
