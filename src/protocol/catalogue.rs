//! Literal probe packets and expected responses
//!
//! Every probe except CONNECT is sent as a fixed byte string, and every
//! response is matched by exact prefix against fixed byte strings. All
//! packets that carry a packet identifier use `0x0001`. The v5.0 forms only
//! differ from the v3.1.1 forms by a zero-length property block (or, for
//! PUBREL, a zero reason code in the same position).

use super::ProtocolVersion;

/// A request the prober can put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    PingReq,
    /// QoS 0 PUBLISH of "B" to topic "A"
    PublishQos0,
    /// QoS 1 PUBLISH of "B" to topic "A"
    PublishQos1,
    /// QoS 2 PUBLISH of "B" to topic "A"
    PublishQos2,
    /// PUBLISH with the reserved QoS value 3
    PublishQos3,
    PubRel,
    /// Retained QoS 1 PUBLISH to `$SYS/mqttinfo`
    PublishSys,
    /// SUBSCRIBE to `#`
    SubscribeAll,
    /// SUBSCRIBE to `A+`, a wildcard that does not occupy a whole level
    SubscribeInvalidFilter,
    /// SUBSCRIBE to the bytes `0xC3 0x28`
    SubscribeInvalidUtf8,
    /// SUBSCRIBE at QoS 1 to `$SYS/mqttinfo`
    SubscribeSys,
    /// SUBSCRIBE to `$SYS/#`
    SubscribeSysAll,
    /// SUBSCRIBE to `$SYS/+/router/subscriptions`
    SubscribeRoutingStats,
    /// SUBSCRIBE to `$SYS/+/load/messages/sent/+`
    SubscribeClientCounters,
}

/// A response shape the prober recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expect {
    PingResp,
    PubAck,
    PubRec,
    PubComp,
    /// SUBACK granting QoS 0
    SubAckQos0,
    /// SUBACK granting QoS 1
    SubAckQos1,
}

mod v311 {
    pub const PINGREQ: &[u8] = b"\xc0\x00";
    pub const PINGRESP: &[u8] = b"\xd0\x00";

    pub const PUBLISH_QOS0: &[u8] = b"\x30\x04\x00\x01\x41\x42";
    pub const PUBLISH_QOS1: &[u8] = b"\x32\x06\x00\x01\x41\x00\x01\x42";
    pub const PUBLISH_QOS2: &[u8] = b"\x34\x06\x00\x01\x41\x00\x01\x42";
    pub const PUBLISH_QOS3: &[u8] = b"\x36\x06\x00\x01\x41\x00\x01\x42";
    pub const PUBLISH_SYS: &[u8] = b"\x33\x12\x00\x0d$SYS/mqttinfo\x00\x01\x41";

    pub const PUBACK: &[&[u8]] = &[b"\x40\x02\x00\x01"];
    pub const PUBREC: &[&[u8]] = &[b"\x50\x02\x00\x01"];
    pub const PUBREL: &[u8] = b"\x62\x02\x00\x01";
    pub const PUBCOMP: &[u8] = b"\x70\x02\x00\x01";

    pub const SUBSCRIBE_ALL: &[u8] = b"\x82\x06\x00\x01\x00\x01#\x00";
    pub const SUBSCRIBE_INVALID: &[u8] = b"\x82\x07\x00\x01\x00\x02A+\x00";
    pub const SUBSCRIBE_INVALID_UTF8: &[u8] = b"\x82\x07\x00\x01\x00\x02\xc3\x28\x00";
    pub const SUBSCRIBE_SYS: &[u8] = b"\x82\x12\x00\x01\x00\x0d$SYS/mqttinfo\x01";
    pub const SUBSCRIBE_SYS_ALL: &[u8] = b"\x82\x0b\x00\x01\x00\x06$SYS/#\x00";
    pub const SUBSCRIBE_ROUTING_STATS: &[u8] =
        b"\x82\x20\x00\x01\x00\x1b$SYS/+/router/subscriptions\x00";
    pub const SUBSCRIBE_CLIENT_COUNTERS: &[u8] =
        b"\x82\x20\x00\x01\x00\x1b$SYS/+/load/messages/sent/+\x00";

    pub const SUBACK_QOS0: &[u8] = b"\x90\x03\x00\x01\x00";
    pub const SUBACK_QOS1: &[u8] = b"\x90\x03\x00\x01\x01";
}

mod v5 {
    pub const PUBLISH_QOS0: &[u8] = b"\x30\x05\x00\x01\x41\x00\x42";
    pub const PUBLISH_QOS1: &[u8] = b"\x32\x07\x00\x01\x41\x00\x01\x00\x42";
    pub const PUBLISH_QOS2: &[u8] = b"\x34\x07\x00\x01\x41\x00\x01\x00\x42";
    pub const PUBLISH_QOS3: &[u8] = b"\x36\x07\x00\x01\x41\x00\x01\x00\x42";
    pub const PUBLISH_SYS: &[u8] = b"\x33\x13\x00\x0d$SYS/mqttinfo\x00\x01\x00\x41";

    // bare ack, or ack with reason 0x10 (no matching subscribers)
    pub const PUBACK: &[&[u8]] = &[b"\x40\x02\x00\x01", b"\x40\x03\x00\x01\x10"];
    pub const PUBREC: &[&[u8]] = &[b"\x50\x02\x00\x01", b"\x50\x03\x00\x01\x10"];
    pub const PUBREL: &[u8] = b"\x62\x03\x00\x01\x00";
    pub const PUBCOMP: &[u8] = b"\x70\x02\x00\x01";

    pub const SUBSCRIBE_ALL: &[u8] = b"\x82\x07\x00\x01\x00\x00\x01#\x00";
    pub const SUBSCRIBE_INVALID: &[u8] = b"\x82\x08\x00\x01\x00\x00\x02A+\x00";
    pub const SUBSCRIBE_INVALID_UTF8: &[u8] = b"\x82\x08\x00\x01\x00\x00\x02\xc3\x28\x00";
    pub const SUBSCRIBE_SYS: &[u8] = b"\x82\x13\x00\x01\x00\x00\x0d$SYS/mqttinfo\x01";
    pub const SUBSCRIBE_SYS_ALL: &[u8] = b"\x82\x0c\x00\x01\x00\x00\x06$SYS/#\x00";
    pub const SUBSCRIBE_ROUTING_STATS: &[u8] =
        b"\x82\x21\x00\x01\x00\x00\x1b$SYS/+/router/subscriptions\x00";
    pub const SUBSCRIBE_CLIENT_COUNTERS: &[u8] =
        b"\x82\x21\x00\x01\x00\x00\x1b$SYS/+/load/messages/sent/+\x00";

    pub const SUBACK_QOS0: &[u8] = b"\x90\x04\x00\x01\x00\x00";
    pub const SUBACK_QOS1: &[u8] = b"\x90\x04\x00\x01\x00\x01";
}

impl Probe {
    /// Wire bytes of this probe for `version`
    pub fn packet(self, version: ProtocolVersion) -> &'static [u8] {
        use ProtocolVersion::*;

        match (version, self) {
            (_, Probe::PingReq) => v311::PINGREQ,
            (V3_1_1, Probe::PublishQos0) => v311::PUBLISH_QOS0,
            (V3_1_1, Probe::PublishQos1) => v311::PUBLISH_QOS1,
            (V3_1_1, Probe::PublishQos2) => v311::PUBLISH_QOS2,
            (V3_1_1, Probe::PublishQos3) => v311::PUBLISH_QOS3,
            (V3_1_1, Probe::PubRel) => v311::PUBREL,
            (V3_1_1, Probe::PublishSys) => v311::PUBLISH_SYS,
            (V3_1_1, Probe::SubscribeAll) => v311::SUBSCRIBE_ALL,
            (V3_1_1, Probe::SubscribeInvalidFilter) => v311::SUBSCRIBE_INVALID,
            (V3_1_1, Probe::SubscribeInvalidUtf8) => v311::SUBSCRIBE_INVALID_UTF8,
            (V3_1_1, Probe::SubscribeSys) => v311::SUBSCRIBE_SYS,
            (V3_1_1, Probe::SubscribeSysAll) => v311::SUBSCRIBE_SYS_ALL,
            (V3_1_1, Probe::SubscribeRoutingStats) => v311::SUBSCRIBE_ROUTING_STATS,
            (V3_1_1, Probe::SubscribeClientCounters) => v311::SUBSCRIBE_CLIENT_COUNTERS,
            (V5_0, Probe::PublishQos0) => v5::PUBLISH_QOS0,
            (V5_0, Probe::PublishQos1) => v5::PUBLISH_QOS1,
            (V5_0, Probe::PublishQos2) => v5::PUBLISH_QOS2,
            (V5_0, Probe::PublishQos3) => v5::PUBLISH_QOS3,
            (V5_0, Probe::PubRel) => v5::PUBREL,
            (V5_0, Probe::PublishSys) => v5::PUBLISH_SYS,
            (V5_0, Probe::SubscribeAll) => v5::SUBSCRIBE_ALL,
            (V5_0, Probe::SubscribeInvalidFilter) => v5::SUBSCRIBE_INVALID,
            (V5_0, Probe::SubscribeInvalidUtf8) => v5::SUBSCRIBE_INVALID_UTF8,
            (V5_0, Probe::SubscribeSys) => v5::SUBSCRIBE_SYS,
            (V5_0, Probe::SubscribeSysAll) => v5::SUBSCRIBE_SYS_ALL,
            (V5_0, Probe::SubscribeRoutingStats) => v5::SUBSCRIBE_ROUTING_STATS,
            (V5_0, Probe::SubscribeClientCounters) => v5::SUBSCRIBE_CLIENT_COUNTERS,
        }
    }
}

impl Expect {
    /// Every accepted form of this response for `version`
    pub fn patterns(self, version: ProtocolVersion) -> &'static [&'static [u8]] {
        use ProtocolVersion::*;

        match (version, self) {
            (_, Expect::PingResp) => &[v311::PINGRESP],
            (V3_1_1, Expect::PubComp) => &[v311::PUBCOMP],
            (V5_0, Expect::PubComp) => &[v5::PUBCOMP],
            (V3_1_1, Expect::PubAck) => v311::PUBACK,
            (V3_1_1, Expect::PubRec) => v311::PUBREC,
            (V3_1_1, Expect::SubAckQos0) => &[v311::SUBACK_QOS0],
            (V3_1_1, Expect::SubAckQos1) => &[v311::SUBACK_QOS1],
            (V5_0, Expect::PubAck) => v5::PUBACK,
            (V5_0, Expect::PubRec) => v5::PUBREC,
            (V5_0, Expect::SubAckQos0) => &[v5::SUBACK_QOS0],
            (V5_0, Expect::SubAckQos1) => &[v5::SUBACK_QOS1],
        }
    }

    /// Canonical (first) form, used when composing expected byte sequences
    pub fn primary(self, version: ProtocolVersion) -> &'static [u8] {
        self.patterns(version)[0]
    }

    /// Whether `response` starts with any accepted form
    pub fn matches(self, version: ProtocolVersion, response: &[u8]) -> bool {
        self.patterns(version)
            .iter()
            .any(|pattern| response.starts_with(pattern))
    }

    /// Length of the accepted form `response` starts with, if any
    pub fn matched_len(self, version: ProtocolVersion, response: &[u8]) -> Option<usize> {
        self.patterns(version)
            .iter()
            .filter(|pattern| response.starts_with(pattern))
            .map(|pattern| pattern.len())
            .max()
    }
}
