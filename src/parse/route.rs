//! `show ip route`

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::Grammar;
use crate::device::Os;
use crate::error::{NetdevMcpError, Result};

static ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<code>[a-zA-Z%+]{1,2}\*?(?:\s?[A-Z]{1,2}\d?)?)\s+(?P<prefix>\d{1,3}(?:\.\d{1,3}){3}(?:/\d{1,2})?)\s+(?P<rest>.+)$",
    )
    .expect("route entry pattern is valid")
});

static VIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[(?P<pref>\d+)/(?P<metric>\d+)\] via (?P<nh>\d{1,3}(?:\.\d{1,3}){3})(?:, (?P<updated>\d[\w:]*))?(?:, (?P<intf>\S+))?\s*$",
    )
    .expect("next hop pattern is valid")
});

static CONNECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^is directly connected, (?P<intf>\S+)").expect("connected pattern is valid")
});

static GATEWAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Gateway of last resort is (?P<gw>\S+)").expect("gateway pattern is valid")
});

pub struct ShowIpRoute;

impl Grammar for ShowIpRoute {
    fn command(&self) -> &'static str {
        "show ip route"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::Ios, Os::Iosxe]
    }

    fn parse(&self, output: &str) -> Result<Value> {
        let mut routes = Map::new();
        let mut gateway = None;
        let mut last_prefix: Option<String> = None;

        for line in output.lines() {
            let line = line.trim_end();

            if let Some(caps) = GATEWAY.captures(line) {
                gateway = Some(caps["gw"].to_string());
                continue;
            }

            if let Some(caps) = ENTRY.captures(line) {
                let prefix = caps["prefix"].to_string();
                let codes = caps["code"].to_string();
                routes.insert(prefix.clone(), route_entry(&prefix, &codes, &caps["rest"]));
                last_prefix = Some(prefix);
                continue;
            }

            // ECMP continuation: "                [110/2] via 10.0.0.3, 00:01:02, Gi2"
            if line.starts_with(char::is_whitespace) {
                let Some(caps) = VIA.captures(line.trim_start()) else {
                    continue;
                };
                if let Some(route) = last_prefix
                    .as_ref()
                    .and_then(|p| routes.get_mut(p))
                    .and_then(Value::as_object_mut)
                {
                    push_next_hop(route, &caps);
                }
            }
        }

        if routes.is_empty() {
            return Err(NetdevMcpError::parse("no routes in 'show ip route' output"));
        }

        let mut ipv4 = Map::new();
        ipv4.insert("routes".to_string(), Value::Object(routes));
        if let Some(gw) = gateway {
            ipv4.insert("gateway_of_last_resort".to_string(), json!(gw));
        }

        Ok(json!({
            "vrf": {
                "default": {
                    "address_family": { "ipv4": ipv4 }
                }
            }
        }))
    }
}

fn route_entry(prefix: &str, codes: &str, rest: &str) -> Value {
    let mut route = Map::new();
    route.insert("route".to_string(), json!(prefix));
    route.insert("active".to_string(), json!(true));
    route.insert("source_protocol_codes".to_string(), json!(codes));
    route.insert("source_protocol".to_string(), json!(source_protocol(codes)));

    if let Some(caps) = CONNECTED.captures(rest) {
        let intf = &caps["intf"];
        route.insert(
            "next_hop".to_string(),
            json!({ "outgoing_interface": { intf: { "outgoing_interface": intf } } }),
        );
    } else if let Some(caps) = VIA.captures(rest) {
        push_next_hop(&mut route, &caps);
    }

    Value::Object(route)
}

fn push_next_hop(route: &mut Map<String, Value>, caps: &regex::Captures<'_>) {
    let pref: u64 = caps["pref"].parse().unwrap_or_default();
    let metric: u64 = caps["metric"].parse().unwrap_or_default();
    route.entry("route_preference").or_insert(json!(pref));
    route.entry("metric").or_insert(json!(metric));

    let list = route
        .entry("next_hop")
        .or_insert_with(|| json!({ "next_hop_list": {} }))
        .as_object_mut()
        .and_then(|nh| nh.get_mut("next_hop_list"))
        .and_then(Value::as_object_mut);

    let Some(list) = list else {
        return;
    };

    let index = list.len() + 1;
    let mut hop = Map::new();
    hop.insert("index".to_string(), json!(index));
    hop.insert("next_hop".to_string(), json!(&caps["nh"]));
    if let Some(updated) = caps.name("updated") {
        hop.insert("updated".to_string(), json!(updated.as_str()));
    }
    if let Some(intf) = caps.name("intf") {
        hop.insert("outgoing_interface".to_string(), json!(intf.as_str()));
    }
    list.insert(index.to_string(), Value::Object(hop));
}

fn source_protocol(codes: &str) -> &'static str {
    let first = codes.trim_end_matches('*').chars().next().unwrap_or(' ');
    match first {
        'C' => "connected",
        'L' => "local",
        'S' => "static",
        'R' => "rip",
        'B' => "bgp",
        'D' => "eigrp",
        'O' => "ospf",
        'i' => "isis",
        'o' => "odr",
        'M' => "mobile",
        'E' => "egp",
        'H' => "nhrp",
        'l' => "lisp",
        'a' => "application",
        _ => "unknown",
    }
}
