//! Wire format for the sea server's text frames
//!
//! Every frame starts with a short tag. Inbound position updates are `e:`
//! followed by a JSON object keyed by entity id; echo replies are `a:`
//! followed by the echoed position. Outbound control changes are `ks:`
//! followed by the integer bitmask, and the echo probe is the literal
//! `ahoy!`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::Controls;

const ENTITIES_TAG: &str = "e:";
const ECHO_TAG: &str = "a:";
const CONTROLS_TAG: &str = "ks:";
const PROBE_LITERAL: &str = "ahoy!";

/// Partial entity state; absent fields are left as they were
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
}

impl EntityPatch {
    /// Updates that carry velocity close out a server tick
    pub fn has_velocity(&self) -> bool {
        self.vx.is_some() && self.vy.is_some()
    }
}

/// Position carried by an echo reply
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoReply {
    pub x: f64,
    pub y: f64,
}

/// Messages received from the server that the engine cares about
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMsg {
    /// Entity updates; `None` means the entity left
    Entities(HashMap<String, Option<EntityPatch>>),
    /// Someone's echo probe, echoed back with the emitter's position
    Echo(EchoReply),
}

impl InboundMsg {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if let Some(payload) = text.strip_prefix(ENTITIES_TAG) {
            Ok(Self::Entities(serde_json::from_str(payload)?))
        } else if let Some(payload) = text.strip_prefix(ECHO_TAG) {
            Ok(Self::Echo(serde_json::from_str(payload)?))
        } else {
            Err(ProtocolError::UnknownTag(tag_of(text).to_string()))
        }
    }
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMsg {
    /// New commanded control state
    Controls(Controls),
    /// Echo probe
    Probe,
    /// Any other game message, passed through untouched
    Other(String),
}

impl OutboundMsg {
    pub fn encode(&self) -> String {
        match self {
            Self::Controls(controls) => format!("{CONTROLS_TAG}{}", controls.bits()),
            Self::Probe => PROBE_LITERAL.to_string(),
            Self::Other(text) => text.clone(),
        }
    }

    /// Classify outbound text produced elsewhere in the client
    pub fn decode(text: &str) -> Self {
        if text == PROBE_LITERAL {
            return Self::Probe;
        }
        if let Some(bits) = text
            .strip_prefix(CONTROLS_TAG)
            .and_then(|b| b.trim().parse::<u32>().ok())
        {
            return Self::Controls(Controls::from_wire(bits));
        }
        Self::Other(text.to_string())
    }
}

fn tag_of(text: &str) -> &str {
    match text.find(':') {
        Some(i) => &text[..=i],
        None => text.get(..2).unwrap_or(text),
    }
}

/// Reasons an inbound frame is ignored
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unhandled message tag: {0:?}")]
    UnknownTag(String),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entity_update() {
        let msg = InboundMsg::parse(r#"e:{"abc":{"vx":0.25,"vy":-0.5,"x":10,"name":"Bob"},"gone":null}"#)
            .expect("valid update");
        let InboundMsg::Entities(map) = msg else {
            panic!("expected entities");
        };
        let patch = map["abc"].clone().expect("patch");
        assert_eq!(patch.vx, Some(0.25));
        assert_eq!(patch.x, Some(10.0));
        assert_eq!(patch.y, None);
        assert!(patch.has_velocity());
        assert_eq!(map["gone"], None);
    }

    #[test]
    fn parses_echo_reply() {
        let msg = InboundMsg::parse(r#"a:{"x":1.5,"y":2}"#).expect("valid echo");
        assert_eq!(msg, InboundMsg::Echo(EchoReply { x: 1.5, y: 2.0 }));
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            InboundMsg::parse("c:hello"),
            Err(ProtocolError::UnknownTag(tag)) if tag == "c:"
        ));
        assert!(matches!(
            InboundMsg::parse("a:{not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn encodes_outbound() {
        let c = Controls::RIGHT | Controls::ANCHOR;
        assert_eq!(OutboundMsg::Controls(c).encode(), "ks:18");
        assert_eq!(OutboundMsg::Probe.encode(), "ahoy!");
    }

    #[test]
    fn decodes_outbound_text() {
        assert_eq!(OutboundMsg::decode("ahoy!"), OutboundMsg::Probe);
        assert_eq!(
            OutboundMsg::decode("ks:5"),
            OutboundMsg::Controls(Controls::LEFT | Controls::UP)
        );
        assert_eq!(OutboundMsg::decode("reel"), OutboundMsg::Other("reel".into()));
    }
}
