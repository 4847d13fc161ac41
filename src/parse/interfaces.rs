//! `show ip interface brief`

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::Grammar;
use crate::device::Os;
use crate::error::{NetdevMcpError, Result};

static ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<interface>\S+)\s+(?P<ip>\S+)\s+(?P<ok>YES|NO)\s+(?P<method>\S+)\s+(?P<status>administratively down|up|down|deleted)\s+(?P<protocol>up|down)\s*$",
    )
    .expect("interface row pattern is valid")
});

pub struct ShowIpInterfaceBrief;

impl Grammar for ShowIpInterfaceBrief {
    fn command(&self) -> &'static str {
        "show ip interface brief"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::Ios, Os::Iosxe]
    }

    fn parse(&self, output: &str) -> Result<Value> {
        let mut interfaces = Map::new();

        for line in output.lines() {
            let Some(caps) = ROW.captures(line.trim_end()) else {
                continue;
            };
            interfaces.insert(
                caps["interface"].to_string(),
                json!({
                    "ip_address": &caps["ip"],
                    "interface_is_ok": &caps["ok"],
                    "method": &caps["method"],
                    "status": &caps["status"],
                    "protocol": &caps["protocol"],
                }),
            );
        }

        if interfaces.is_empty() {
            return Err(NetdevMcpError::parse(
                "no interface rows in 'show ip interface brief' output",
            ));
        }

        Ok(json!({ "interface": interfaces }))
    }
}
