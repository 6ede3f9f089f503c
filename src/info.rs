//! Parsed `INFO` payloads.
//!
//! Probes keep the fields they actually read in explicit structs with
//! `Option` members. A field missing from the payload stays `None`; it is
//! never replaced with a placeholder string.

/// Extract a field value from an INFO payload.
///
/// INFO lines are `key:value` with CRLF endings; comment lines start
/// with `#`. The colon check keeps `foo` from matching `foobar:1`.
pub fn info_field<'a>(raw: &'a str, key: &str) -> Option<&'a str> {
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix(key) {
            if let Some(value) = rest.strip_prefix(':') {
                return Some(value.trim_end_matches('\r'));
            }
        }
    }
    None
}

/// Fields read from a data node's `INFO` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub role: Option<String>,
    pub connected_clients: Option<u32>,
    pub used_memory_human: Option<String>,
}

impl NodeInfo {
    pub fn parse(raw: &str) -> Self {
        Self {
            role: info_field(raw, "role").map(str::to_string),
            connected_clients: info_field(raw, "connected_clients").and_then(|v| v.parse().ok()),
            used_memory_human: info_field(raw, "used_memory_human").map(str::to_string),
        }
    }
}

/// Fields read from a Sentinel's `INFO sentinel` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentinelInfo {
    pub masters: Option<u32>,
    pub tilt: Option<bool>,
    pub running_scripts: Option<u32>,
}

impl SentinelInfo {
    pub fn parse(raw: &str) -> Self {
        Self {
            masters: info_field(raw, "sentinel_masters").and_then(|v| v.parse().ok()),
            tilt: info_field(raw, "sentinel_tilt").and_then(|v| match v {
                "0" => Some(false),
                "1" => Some(true),
                _ => None,
            }),
            running_scripts: info_field(raw, "sentinel_running_scripts")
                .and_then(|v| v.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_PAYLOAD: &str = "# Server\r\nredis_version:7.2.4\r\n\r\n# Clients\r\nconnected_clients:17\r\n\r\n# Memory\r\nused_memory_human:1.04M\r\n\r\n# Replication\r\nrole:master\r\nconnected_slaves:2\r\n";

    const SENTINEL_PAYLOAD: &str = "# Sentinel\r\nsentinel_masters:3\r\nsentinel_tilt:0\r\nsentinel_running_scripts:0\r\nsentinel_scripts_queue_length:0\r\n";

    #[test]
    fn test_node_info_parse() {
        let info = NodeInfo::parse(NODE_PAYLOAD);
        assert_eq!(info.role.as_deref(), Some("master"));
        assert_eq!(info.connected_clients, Some(17));
        assert_eq!(info.used_memory_human.as_deref(), Some("1.04M"));
    }

    #[test]
    fn test_missing_fields_stay_none() {
        let info = NodeInfo::parse("# Server\r\nredis_version:7.2.4\r\n");
        assert_eq!(info.role, None);
        assert_eq!(info.connected_clients, None);
        assert_eq!(info.used_memory_human, None);
    }

    #[test]
    fn test_sentinel_info_parse() {
        let info = SentinelInfo::parse(SENTINEL_PAYLOAD);
        assert_eq!(info.masters, Some(3));
        assert_eq!(info.tilt, Some(false));
        assert_eq!(info.running_scripts, Some(0));
    }

    #[test]
    fn test_sentinel_tilt_set() {
        let info = SentinelInfo::parse("sentinel_masters:1\r\nsentinel_tilt:1\r\n");
        assert_eq!(info.tilt, Some(true));
    }

    #[test]
    fn test_field_requires_colon_boundary() {
        assert_eq!(info_field("role_reported:slave\r\nrole:master\r\n", "role"), Some("master"));
        assert_eq!(info_field("sentinel_masters_extra:9\r\n", "sentinel_masters"), None);
    }

    #[test]
    fn test_unparsable_number_is_none() {
        let info = NodeInfo::parse("connected_clients:lots\r\n");
        assert_eq!(info.connected_clients, None);
    }
}
