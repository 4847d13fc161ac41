//! `show version`

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::Grammar;
use crate::device::Os;
use crate::error::{NetdevMcpError, Result};

static VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Cisco IOS(?P<xe> XE)? Software.*?,\s*Version (?P<version>[^,\s]+)")
        .expect("version pattern is valid")
});

static UPTIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?P<hostname>\S+) uptime is (?P<uptime>.+?)\s*$")
        .expect("uptime pattern is valid")
});

static IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^System image file is "(?P<image>[^"]+)""#).expect("image pattern is valid")
});

static PLATFORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^cisco (?P<platform>\S+) .*processor").expect("platform pattern is valid")
});

static CONFIG_REGISTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Configuration register is (?P<register>\S+)")
        .expect("config register pattern is valid")
});

pub struct ShowVersion;

impl Grammar for ShowVersion {
    fn command(&self) -> &'static str {
        "show version"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::Ios, Os::Iosxe]
    }

    fn parse(&self, output: &str) -> Result<Value> {
        let caps = VERSION
            .captures(output)
            .ok_or_else(|| NetdevMcpError::parse("no Cisco IOS version line in output"))?;

        let mut version = Map::new();
        version.insert("version".to_string(), json!(&caps["version"]));
        let os = if caps.name("xe").is_some() { "IOS-XE" } else { "IOS" };
        version.insert("os".to_string(), json!(os));

        if let Some(caps) = UPTIME.captures(output) {
            version.insert("hostname".to_string(), json!(&caps["hostname"]));
            version.insert("uptime".to_string(), json!(&caps["uptime"]));
        }
        if let Some(caps) = IMAGE.captures(output) {
            version.insert("system_image".to_string(), json!(&caps["image"]));
        }
        if let Some(caps) = PLATFORM.captures(output) {
            version.insert("chassis".to_string(), json!(&caps["platform"]));
        }
        if let Some(caps) = CONFIG_REGISTER.captures(output) {
            version.insert("curr_config_register".to_string(), json!(&caps["register"]));
        }

        Ok(json!({ "version": version }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"Cisco IOS XE Software, Version 17.03.04a
Cisco IOS Software [Amsterdam], Virtual XE Software (X86_64_LINUX_IOSD-UNIVERSALK9-M), Version 17.3.4a, RELEASE SOFTWARE (fc3)
Technical Support: http://www.cisco.com/techsupport

csr1000v-1 uptime is 2 days, 3 hours, 14 minutes
Uptime for this control processor is 2 days, 3 hours, 16 minutes
System image file is "bootflash:packages.conf"

cisco CSR1000V (VXE) processor (revision VXE) with 2072003K/3075K bytes of memory.
Configuration register is 0x2102
"#;

    #[test]
    fn test_parse_iosxe_version() {
        let parsed = ShowVersion.parse(OUTPUT).unwrap();
        let version = &parsed["version"];
        assert_eq!(version["version"], "17.03.04a");
        assert_eq!(version["os"], "IOS-XE");
        assert_eq!(version["hostname"], "csr1000v-1");
        assert_eq!(version["uptime"], "2 days, 3 hours, 14 minutes");
        assert_eq!(version["system_image"], "bootflash:packages.conf");
        assert_eq!(version["chassis"], "CSR1000V");
        assert_eq!(version["curr_config_register"], "0x2102");
    }

    #[test]
    fn test_parse_classic_ios() {
        let output = "Cisco IOS Software, 7200 Software (C7200-ADVENTERPRISEK9-M), Version 15.2(4)M7, RELEASE SOFTWARE (fc2)\nR1 uptime is 5 minutes\n";
        let parsed = ShowVersion.parse(output).unwrap();
        assert_eq!(parsed["version"]["version"], "15.2(4)M7");
        assert_eq!(parsed["version"]["os"], "IOS");
        assert_eq!(parsed["version"]["hostname"], "R1");
    }

    #[test]
    fn test_non_cisco_output_fails() {
        assert!(ShowVersion.parse("Linux ubuntu 5.15.0").is_err());
    }
}
