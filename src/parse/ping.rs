//! `ping <target> ...` on IOS / IOS-XE

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::Grammar;
use crate::device::Os;
use crate::error::{NetdevMcpError, Result};

static SENDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Sending (?P<repeat>\d+), (?P<bytes>\d+)-byte ICMP Echos to (?P<address>\S+), timeout is (?P<timeout>\d+) seconds",
    )
    .expect("ping header pattern is valid")
});

static SUCCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Success rate is (?P<rate>\d+(?:\.\d+)?) percent \((?P<received>\d+)/(?P<sent>\d+)\)(?:, round-trip min/avg/max = (?P<min>\d+)/(?P<avg>\d+)/(?P<max>\d+) ms)?",
    )
    .expect("ping statistics pattern is valid")
});

static RESULT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[!.UQMA?&]+$").expect("ping result pattern is valid"));

pub struct Ping;

impl Grammar for Ping {
    fn command(&self) -> &'static str {
        "ping"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::Ios, Os::Iosxe]
    }

    /// Bare `ping` is interactive and has no fixed output shape
    fn matches(&self, command: &str) -> bool {
        command.starts_with("ping ")
    }

    fn parse(&self, output: &str) -> Result<Value> {
        let stats = SUCCESS
            .captures(output)
            .ok_or_else(|| NetdevMcpError::parse("no success-rate line in ping output"))?;

        let mut ping = Map::new();

        if let Some(header) = SENDING.captures(output) {
            ping.insert("address".to_string(), json!(&header["address"]));
            ping.insert("repeat".to_string(), json!(number(&header["repeat"])));
            ping.insert("data_bytes".to_string(), json!(number(&header["bytes"])));
            ping.insert("timeout_secs".to_string(), json!(number(&header["timeout"])));
        }

        let results: Vec<&str> = output
            .lines()
            .map(str::trim)
            .filter(|line| RESULT_LINE.is_match(line))
            .collect();
        ping.insert("result_per_line".to_string(), json!(results));

        let mut statistics = Map::new();
        statistics.insert("send".to_string(), json!(number(&stats["sent"])));
        statistics.insert("received".to_string(), json!(number(&stats["received"])));
        statistics.insert(
            "success_rate_percent".to_string(),
            json!(stats["rate"].parse::<f64>().unwrap_or_default()),
        );
        if let (Some(min), Some(avg), Some(max)) =
            (stats.name("min"), stats.name("avg"), stats.name("max"))
        {
            statistics.insert(
                "round_trip".to_string(),
                json!({
                    "min_ms": number(min.as_str()),
                    "avg_ms": number(avg.as_str()),
                    "max_ms": number(max.as_str()),
                }),
            );
        }
        ping.insert("statistics".to_string(), Value::Object(statistics));

        Ok(json!({ "ping": ping }))
    }
}

fn number(text: &str) -> u64 {
    text.parse().unwrap_or_default()
}
