//! Command dispatch
//!
//! Every tool call goes through [`Dispatcher`]: policy check, session
//! acquisition, parse-then-raw execution, unconditional release, and one
//! [`ResultEnvelope`] at the end. Each dispatch runs on its own task so a
//! panic inside a session turns into an error envelope instead of taking
//! the server down.

pub mod envelope;
pub mod lease;
pub mod policy;
pub mod request;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::device::{DeviceSession, SessionProvider};
use crate::error::{NetdevMcpError, Result};
use crate::text::{clean_output, dedent};

pub use envelope::{Output, ResultEnvelope, Status};
pub use lease::SessionLease;
pub use policy::{wrap_linux_command, Policy, PolicyError, DISALLOWED_SHOW_TOKENS};
pub use request::{CommandKind, CommandRequest};

/// Running configuration as learned by `show_running_config`
pub const LEARN_CONFIG_COMMAND: &str = "show run brief";

/// Recent logs as learned by `show_logging`
pub const LEARN_LOGGING_COMMAND: &str = "show logging last 250";

/// Outcome of parse-then-raw
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Parsed(Value),
    Raw(String),
}

impl Fetched {
    /// Try the platform grammar; on any parse failure run the command raw
    pub async fn parse_or_raw(session: &mut dyn DeviceSession, command: &str) -> Result<Self> {
        let device = session.name().to_string();
        info!("Attempting to parse '{}' on {}", command, device);

        match session.parse(command).await {
            Ok(record) => {
                info!("Parsed output of '{}' on {}", command, device);
                Ok(Fetched::Parsed(record))
            }
            Err(e) => {
                warn!(
                    "Parsing failed for '{}' on {}: {}. Falling back to execute.",
                    command, device, e
                );
                let raw = session.execute(command).await?;
                info!("Executed '{}' on {} (fallback)", command, device);
                Ok(Fetched::Raw(raw))
            }
        }
    }

    pub fn into_envelope(self, device: &str) -> ResultEnvelope {
        match self {
            Fetched::Parsed(record) => ResultEnvelope::completed(device, record),
            Fetched::Raw(text) => ResultEnvelope::completed_raw(device, text),
        }
    }
}

/// Work performed while a session is held
#[derive(Debug, Clone)]
enum Job {
    Request(CommandRequest),
    LearnConfig,
    LearnLogging,
}

/// Routes validated requests to device sessions
#[derive(Clone)]
pub struct Dispatcher {
    sessions: Arc<dyn SessionProvider>,
    policy: Policy,
    connect_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        connect_timeout: Duration,
        max_chars: Option<usize>,
    ) -> Self {
        Self {
            sessions,
            policy: Policy::new(max_chars),
            connect_timeout,
        }
    }

    /// Policy check only; never touches a device
    pub fn validate(&self, request: &CommandRequest) -> std::result::Result<(), PolicyError> {
        self.policy.validate(request)
    }

    /// Validate and run one show, ping, linux or config request
    pub async fn execute(&self, request: CommandRequest) -> ResultEnvelope {
        let device = request.device_name().to_string();
        let prefix = request.kind().error_prefix();

        if let Err(refusal) = self.validate(&request) {
            warn!(
                "Rejected {} command on {}: {}",
                request.kind(),
                device,
                refusal
            );
            return ResultEnvelope::from_outcome(&device, prefix, Err(refusal.into()));
        }

        self.isolated(&device, prefix, Job::Request(request)).await
    }

    /// Apply a configuration block
    pub async fn configure(&self, device_name: &str, config_commands: &str) -> ResultEnvelope {
        self.execute(CommandRequest::config(device_name, config_commands))
            .await
    }

    /// Fetch the running configuration as cleaned raw text
    pub async fn learn_config(&self, device_name: &str) -> ResultEnvelope {
        self.isolated(device_name, "Error learning config", Job::LearnConfig)
            .await
    }

    /// Fetch recent logs as cleaned raw text
    pub async fn learn_logging(&self, device_name: &str) -> ResultEnvelope {
        self.isolated(device_name, "Error learning logs", Job::LearnLogging)
            .await
    }

    /// Run `job` on its own task and convert whatever happens into an envelope
    async fn isolated(&self, device: &str, prefix: &str, job: Job) -> ResultEnvelope {
        let this = self.clone();
        let device_name = device.to_string();
        let outcome = join_outcome(tokio::spawn(async move {
            this.with_session(&device_name, job).await
        }))
        .await;

        ResultEnvelope::from_outcome(device, prefix, outcome)
    }

    async fn with_session(&self, device: &str, job: Job) -> Result<ResultEnvelope> {
        let mut lease = SessionLease::acquire(self.sessions.as_ref(), device).await?;
        let outcome = self.perform(&mut lease, device, job).await;
        lease.release().await;
        outcome
    }

    async fn perform(
        &self,
        lease: &mut SessionLease,
        device: &str,
        job: Job,
    ) -> Result<ResultEnvelope> {
        let session = lease.session()?;
        if !session.is_connected() {
            info!("Connecting to {}", device);
            session.connect(self.connect_timeout).await?;
            info!("Connected to {}", device);
        }

        match job {
            Job::Request(request) => run_request(session, &request).await,
            Job::LearnConfig => {
                info!("Learning configuration from {}", device);
                session.enable().await?;
                let raw = session.execute(LEARN_CONFIG_COMMAND).await?;
                Ok(ResultEnvelope::learned(device, clean_output(&raw)))
            }
            Job::LearnLogging => {
                info!("Learning logging output from {}", device);
                let raw = session.execute(LEARN_LOGGING_COMMAND).await?;
                Ok(ResultEnvelope::learned(device, clean_output(&raw)))
            }
        }
    }
}

async fn run_request(
    session: &mut dyn DeviceSession,
    request: &CommandRequest,
) -> Result<ResultEnvelope> {
    let device = request.device_name();

    match request.kind() {
        CommandKind::Show | CommandKind::Ping => {
            Ok(Fetched::parse_or_raw(session, request.raw_command().trim())
                .await?
                .into_envelope(device))
        }
        CommandKind::Linux => {
            // shell text goes out as written, surrounding whitespace included
            let command = request.raw_command();
            let wrapped = wrap_linux_command(command);
            if wrapped != command {
                info!("Detected redirection or pipe, running '{}'", wrapped);
            }
            Ok(Fetched::parse_or_raw(session, &wrapped)
                .await?
                .into_envelope(device))
        }
        CommandKind::Config => {
            let block = dedent(request.raw_command());
            let block = block.trim();
            info!("Applying configuration on {}:\n{}", device, block);
            session.enable().await?;
            let transcript = session.configure(block).await?;
            info!("Configuration result on {}: {}", device, transcript);
            Ok(ResultEnvelope::configured(device, transcript))
        }
    }
}

async fn join_outcome<F>(task: F) -> Result<ResultEnvelope>
where
    F: Future<Output = std::result::Result<Result<ResultEnvelope>, JoinError>>,
{
    match task.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(NetdevMcpError::execution(format!(
                "dispatch task panicked: {}",
                message
            )))
        }
        Err(e) => Err(NetdevMcpError::execution(format!(
            "dispatch task failed: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::device::Os;
    use crate::parse::{Grammar, GrammarRegistry};

    /// What the fake sessions saw
    #[derive(Debug, Default)]
    struct Ledger {
        opened: usize,
        connects: usize,
        disconnects: usize,
        enables: usize,
        executed: Vec<String>,
        parsed: Vec<String>,
        configured: Vec<String>,
    }

    #[derive(Default)]
    struct Script {
        grammars: HashMap<String, Value>,
        outputs: HashMap<String, String>,
        fail_connect: bool,
        panic_on: Option<String>,
        /// When set, `parse` runs through real grammar lookup as an IOS-XE device
        registry: Option<GrammarRegistry>,
    }

    /// Claims `show ip route` but accepts no output
    struct RejectingGrammar;

    impl Grammar for RejectingGrammar {
        fn command(&self) -> &'static str {
            "show ip route"
        }

        fn platforms(&self) -> &'static [Os] {
            &[Os::Iosxe]
        }

        fn parse(&self, output: &str) -> Result<Value> {
            Err(NetdevMcpError::parse(format!(
                "unexpected output: {}",
                output.lines().next().unwrap_or("")
            )))
        }
    }

    struct FakeSession {
        name: String,
        connected: bool,
        script: Arc<Script>,
        ledger: Arc<Mutex<Ledger>>,
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn connect(&mut self, _timeout: Duration) -> Result<()> {
            self.ledger.lock().unwrap().connects += 1;
            if self.script.fail_connect {
                return Err(NetdevMcpError::connection("Connection refused"));
            }
            self.connected = true;
            Ok(())
        }

        async fn execute(&mut self, command: &str) -> Result<String> {
            if self.script.panic_on.as_deref() == Some(command) {
                panic!("device session blew up");
            }
            self.ledger.lock().unwrap().executed.push(command.to_string());
            self.script
                .outputs
                .get(command)
                .cloned()
                .ok_or_else(|| NetdevMcpError::execution("Invalid input detected"))
        }

        async fn parse(&mut self, command: &str) -> Result<Value> {
            self.ledger.lock().unwrap().parsed.push(command.to_string());
            let script = Arc::clone(&self.script);
            if let Some(registry) = &script.registry {
                return registry.run_and_parse(self, Os::Iosxe, command).await;
            }
            self.script
                .grammars
                .get(command)
                .cloned()
                .ok_or_else(|| NetdevMcpError::parse(format!("No parser for '{}'", command)))
        }

        async fn enable(&mut self) -> Result<()> {
            self.ledger.lock().unwrap().enables += 1;
            Ok(())
        }

        async fn configure(&mut self, config: &str) -> Result<String> {
            self.ledger
                .lock()
                .unwrap()
                .configured
                .push(config.to_string());
            Ok(format!("R1(config)#{}\nR1(config)#end", config))
        }

        async fn disconnect(&mut self) -> Result<()> {
            self.ledger.lock().unwrap().disconnects += 1;
            self.connected = false;
            Ok(())
        }
    }

    struct FakeSessions {
        devices: Vec<&'static str>,
        script: Arc<Script>,
        ledger: Arc<Mutex<Ledger>>,
    }

    #[async_trait]
    impl SessionProvider for FakeSessions {
        async fn open(&self, device_name: &str) -> Result<Box<dyn DeviceSession>> {
            if !self.devices.iter().any(|d| *d == device_name) {
                return Err(NetdevMcpError::DeviceNotFound(device_name.to_string()));
            }
            self.ledger.lock().unwrap().opened += 1;
            Ok(Box::new(FakeSession {
                name: device_name.to_string(),
                connected: false,
                script: Arc::clone(&self.script),
                ledger: Arc::clone(&self.ledger),
            }))
        }
    }

    fn dispatcher(script: Script) -> (Dispatcher, Arc<Mutex<Ledger>>) {
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let sessions = FakeSessions {
            devices: vec!["R1", "ubuntu"],
            script: Arc::new(script),
            ledger: Arc::clone(&ledger),
        };
        (
            Dispatcher::new(Arc::new(sessions), Duration::from_secs(120), Some(1000)),
            ledger,
        )
    }

    fn routes_script() -> Script {
        let mut script = Script::default();
        script.grammars.insert(
            "show ip route".to_string(),
            json!({"vrf": {"default": {"address_family": {"ipv4": {"routes": {}}}}}}),
        );
        script
            .outputs
            .insert("show foo bar".to_string(), "foo bar output".to_string());
        script
    }

    #[tokio::test]
    async fn test_parsed_show_command() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show ip route"))
            .await;

        assert_eq!(envelope.status, Status::Completed);
        assert_eq!(envelope.device, "R1");
        assert!(matches!(envelope.output, Some(Output::Structured(_))));

        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.connects, 1);
        assert_eq!(ledger.disconnects, 1);
        assert!(ledger.executed.is_empty());
    }

    #[tokio::test]
    async fn test_unparsed_show_command_falls_back_to_raw() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show foo bar"))
            .await;

        assert_eq!(envelope.status, Status::CompletedRaw);
        assert_eq!(
            envelope.output,
            Some(Output::Raw("foo bar output".to_string()))
        );

        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.parsed, vec!["show foo bar"]);
        assert_eq!(ledger.executed, vec!["show foo bar"]);
        assert_eq!(ledger.disconnects, 1);
    }

    #[tokio::test]
    async fn test_rejected_grammar_output_falls_back_to_raw() {
        let mut registry = GrammarRegistry::new();
        registry.register(Box::new(RejectingGrammar));

        let mut script = Script {
            registry: Some(registry),
            ..Script::default()
        };
        script.outputs.insert(
            "show ip route".to_string(),
            "% Unrecognized table format".to_string(),
        );
        script
            .outputs
            .insert("show foo bar".to_string(), "foo bar output".to_string());
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show ip route"))
            .await;

        assert_eq!(envelope.status, Status::CompletedRaw);
        assert_eq!(
            envelope.output,
            Some(Output::Raw("% Unrecognized table format".to_string()))
        );
        {
            let ledger = ledger.lock().unwrap();
            // once for the grammar, once for the raw fallback
            assert_eq!(ledger.executed, vec!["show ip route", "show ip route"]);
            assert_eq!(ledger.connects, 1);
            assert_eq!(ledger.disconnects, 1);
        }

        // no grammar: the parse attempt executes nothing
        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show foo bar"))
            .await;
        assert_eq!(envelope.status, Status::CompletedRaw);
        let ledger = ledger.lock().unwrap();
        assert_eq!(
            ledger.executed,
            vec!["show ip route", "show ip route", "show foo bar"]
        );
        assert_eq!(ledger.disconnects, 2);
    }

    #[tokio::test]
    async fn test_raw_failure_still_releases() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show nothing"))
            .await;

        assert_eq!(envelope.status, Status::Error);
        assert_eq!(
            envelope.error.as_deref(),
            Some("Execution error: Invalid input detected")
        );
        assert_eq!(ledger.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_deny_listed_show_never_connects() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show run | include interface"))
            .await;

        assert_eq!(envelope.status, Status::Error);
        assert!(envelope
            .error
            .as_deref()
            .unwrap()
            .contains("disallowed term '|'"));

        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.opened, 0);
        assert_eq!(ledger.connects, 0);
    }

    #[tokio::test]
    async fn test_non_show_command_rejected() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "reload"))
            .await;

        assert_eq!(
            envelope.error.as_deref(),
            Some("Command 'reload' is not a 'show' command.")
        );
        assert_eq!(ledger.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_erase_config_rejected() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher.configure("R1", "write erase").await;

        assert_eq!(envelope.status, Status::Error);
        assert_eq!(
            envelope.error.as_deref(),
            Some("Potentially dangerous command detected (erase). Operation aborted.")
        );
        assert_eq!(ledger.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_configure_dedents_and_enables() {
        let (dispatcher, ledger) = dispatcher(routes_script());

        let envelope = dispatcher
            .configure(
                "R1",
                "\n    interface Loopback100\n      description mcp\n",
            )
            .await;

        assert_eq!(envelope.status, Status::Success);
        assert_eq!(
            envelope.message.as_deref(),
            Some("Configuration applied on R1.")
        );

        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.enables, 1);
        assert_eq!(
            ledger.configured,
            vec!["interface Loopback100\n  description mcp"]
        );
        assert_eq!(ledger.disconnects, 1);
    }

    #[tokio::test]
    async fn test_ping_parse_then_raw() {
        let mut script = Script::default();
        script.outputs.insert(
            "ping 8.8.8.8".to_string(),
            "Success rate is 100 percent (5/5)".to_string(),
        );
        let (dispatcher, _ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::ping("R1", "ping 8.8.8.8"))
            .await;
        assert_eq!(envelope.status, Status::CompletedRaw);

        let envelope = dispatcher
            .execute(CommandRequest::ping("R1", "traceroute 8.8.8.8"))
            .await;
        assert_eq!(
            envelope.error.as_deref(),
            Some("Command 'traceroute 8.8.8.8' is not a 'ping' command.")
        );
    }

    #[tokio::test]
    async fn test_linux_pipe_is_wrapped() {
        let mut script = Script::default();
        script.outputs.insert(
            "sh -c \"ps aux | grep sshd\"".to_string(),
            "root 1 sshd".to_string(),
        );
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::linux("ubuntu", "ps aux | grep sshd"))
            .await;

        assert_eq!(envelope.status, Status::CompletedRaw);
        assert_eq!(
            ledger.lock().unwrap().executed,
            vec!["sh -c \"ps aux | grep sshd\""]
        );
    }

    #[tokio::test]
    async fn test_linux_command_is_not_trimmed() {
        let mut script = Script::default();
        script.outputs.insert(
            "sh -c \" ps aux | grep sshd \"".to_string(),
            "root 1 sshd".to_string(),
        );
        script
            .outputs
            .insert("ls -la  ".to_string(), "total 0".to_string());
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::linux("ubuntu", " ps aux | grep sshd "))
            .await;
        assert_eq!(envelope.status, Status::CompletedRaw);

        let envelope = dispatcher
            .execute(CommandRequest::linux("ubuntu", "ls -la  "))
            .await;
        assert_eq!(envelope.output, Some(Output::Raw("total 0".to_string())));

        assert_eq!(
            ledger.lock().unwrap().executed,
            vec!["sh -c \" ps aux | grep sshd \"", "ls -la  "]
        );
    }

    #[tokio::test]
    async fn test_learn_config_cleans_output() {
        let mut script = Script::default();
        script.outputs.insert(
            LEARN_CONFIG_COMMAND.to_string(),
            "\x1b[1mhostname R1\x1b[0m\r\n".to_string(),
        );
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher.learn_config("R1").await;

        assert_eq!(envelope.status, Status::CompletedRaw);
        assert_eq!(
            envelope.output,
            Some(Output::Structured(json!({"raw_output": "hostname R1\r\n"})))
        );
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.enables, 1);
        assert_eq!(ledger.disconnects, 1);
    }

    #[tokio::test]
    async fn test_learn_logging() {
        let mut script = Script::default();
        script.outputs.insert(
            LEARN_LOGGING_COMMAND.to_string(),
            "%SYS-5-CONFIG_I: Configured".to_string(),
        );
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher.learn_logging("R1").await;
        assert_eq!(
            envelope.output,
            Some(Output::Structured(
                json!({"raw_output": "%SYS-5-CONFIG_I: Configured"})
            ))
        );
        assert_eq!(ledger.lock().unwrap().enables, 0);

        let envelope = dispatcher.learn_logging("R9").await;
        assert!(envelope
            .error
            .as_deref()
            .unwrap()
            .starts_with("Error learning logs: "));
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let (dispatcher, _ledger) = dispatcher(routes_script());

        let envelope = dispatcher.learn_config("R9").await;
        assert_eq!(
            envelope.error.as_deref(),
            Some("Error learning config: Device 'R9' not in testbed")
        );
    }

    #[tokio::test]
    async fn test_connect_failure_releases() {
        let script = Script {
            fail_connect: true,
            ..Script::default()
        };
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show version"))
            .await;

        assert_eq!(
            envelope.error.as_deref(),
            Some("Execution error: SSH connection error: Connection refused")
        );
        assert_eq!(ledger.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_and_releases() {
        let script = Script {
            panic_on: Some("show clock".to_string()),
            ..Script::default()
        };
        let (dispatcher, ledger) = dispatcher(script);

        let envelope = dispatcher
            .execute(CommandRequest::show("R1", "show clock"))
            .await;

        assert_eq!(envelope.status, Status::Error);
        assert!(envelope
            .error
            .as_deref()
            .unwrap()
            .contains("device session blew up"));

        // the dropped lease disconnects on a background task
        for _ in 0..50 {
            if ledger.lock().unwrap().disconnects == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ledger.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_fetched_prefers_parsed() {
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let mut session = FakeSession {
            name: "R1".to_string(),
            connected: true,
            script: Arc::new(routes_script()),
            ledger: Arc::clone(&ledger),
        };

        let fetched = Fetched::parse_or_raw(&mut session, "show ip route")
            .await
            .unwrap();
        assert!(matches!(fetched, Fetched::Parsed(_)));

        let fetched = Fetched::parse_or_raw(&mut session, "show foo bar")
            .await
            .unwrap();
        assert_eq!(fetched, Fetched::Raw("foo bar output".to_string()));
    }
}
