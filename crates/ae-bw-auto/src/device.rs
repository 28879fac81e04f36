//! Typed device boundary.
//!
//! Everything the handler reads from or writes to the router goes through
//! [`Device`]. Replies are parsed into typed values here and nowhere else.
//! [`JunosDevice`] is the on-box binding over a NETCONF session.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use junos_script_common::netconf::{NetconfSession, RpcReply, SessionConfig};
use junos_script_common::{xml, ScriptError};

use crate::community::ConfigFragment;
use crate::error::{HandlerError, HandlerResult};
use crate::event::InterfaceHandle;

/// Point-in-time read of the AE's speed and descriptions.
///
/// Descriptions are lists so that more than one at the same level is
/// observable; an empty list means none was configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSnapshot {
    pub name: String,
    /// Speed as reported, e.g. `"10Gbps"` or `"Unspecified"`.
    pub raw_speed: Option<String>,
    /// Descriptions found on logical unit 0.
    pub unit0_descriptions: Vec<String>,
    /// Descriptions found on the physical (IFD) level.
    pub ifd_descriptions: Vec<String>,
}

impl InterfaceSnapshot {
    /// Parses a `get-interface-information` JSON reply.
    pub fn from_json(handle: &InterfaceHandle, reply: &Value) -> HandlerResult<Self> {
        let information = children(reply, "interface-information");
        if information.is_empty() {
            return Err(HandlerError::malformed_reply(
                "get-interface-information",
                "no interface-information element",
            ));
        }

        let unit0 = handle.unit_name(0);
        let mut snapshot = Self {
            name: handle.to_string(),
            ..Self::default()
        };

        for physical in information
            .iter()
            .flat_map(|info| children(info, "physical-interface"))
        {
            if leaf(physical, "name").as_deref() != Some(handle.as_str()) {
                continue;
            }
            if snapshot.raw_speed.is_none() {
                snapshot.raw_speed = leaf(physical, "speed");
            }
            snapshot.ifd_descriptions.extend(leaves(physical, "description"));

            for logical in children(physical, "logical-interface") {
                if leaf(logical, "name").as_deref() == Some(unit0.as_str()) {
                    snapshot
                        .unit0_descriptions
                        .extend(leaves(logical, "description"));
                }
            }
        }

        Ok(snapshot)
    }
}

/// Junos JSON wraps every element in an array; accept a bare object too.
fn children<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    match value.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

fn leaf_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(_) => return value.get("data").and_then(leaf_text),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Every non-empty text value of `key` (`[{"data": "..."}]` form).
fn leaves(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(leaf_text).collect(),
        Some(item) => leaf_text(item).into_iter().collect(),
        None => Vec::new(),
    }
}

fn leaf(value: &Value, key: &str) -> Option<String> {
    leaves(value, key).into_iter().next()
}

/// Reads `routing-options autonomous-system` from a `get-configuration` JSON reply.
pub fn autonomous_system_from_json(reply: &Value) -> Option<String> {
    let configuration = reply.get("configuration")?;
    let routing_options = configuration.get("routing-options")?;
    let autonomous_system = routing_options.get("autonomous-system")?;
    match autonomous_system {
        Value::Object(_) => autonomous_system.get("as-number").and_then(leaf_text),
        other => leaf_text(other),
    }
}

/// The JSON document inside an RPC reply body.
///
/// Junos can emit leading whitespace or a trailing comment after the object.
pub fn reply_json(rpc: &str, reply: &RpcReply) -> HandlerResult<Value> {
    let body = reply.body();
    let (start, end) = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(HandlerError::malformed_reply(
                rpc,
                format!("no JSON document in reply: {:.80}", body),
            ))
        }
    };
    serde_json::from_str(&body[start..=end])
        .map_err(|e| HandlerError::malformed_reply(rpc, e.to_string()))
}

/// Operations the handler needs from the router.
#[async_trait]
pub trait Device: Send {
    /// Speed and descriptions of `handle`.
    async fn interface_snapshot(&mut self, handle: &InterfaceHandle)
        -> HandlerResult<InterfaceSnapshot>;

    /// Committed AS number with inheritance applied, if configured.
    async fn autonomous_system(&mut self) -> HandlerResult<Option<String>>;

    /// Loads `fragment` into the dynamic database, replacing the named object.
    async fn load_replace(&mut self, fragment: &ConfigFragment) -> HandlerResult<()>;

    async fn commit(&mut self) -> HandlerResult<()>;

    async fn unlock(&mut self) -> HandlerResult<()>;

    /// Ends the session. Calling it again is a no-op.
    async fn close(&mut self) -> HandlerResult<()>;
}

/// Opens a [`Device`] with the dynamic database ready for writes.
#[async_trait]
pub trait Connector: Send + Sync {
    type Device: Device;

    async fn connect(&self) -> HandlerResult<Self::Device>;
}

const OPEN_DYNAMIC_RPC: &str = "<open-configuration><dynamic/></open-configuration>";
const CLOSE_CONFIGURATION_RPC: &str = "<close-configuration/>";
const COMMIT_RPC: &str = "<commit-configuration/>";
const UNLOCK_RPC: &str = "<unlock-configuration/>";
const GET_ASN_RPC: &str = concat!(
    "<get-configuration database=\"committed\" inherit=\"inherit\" format=\"json\">",
    "<configuration><routing-options><autonomous-system/></routing-options></configuration>",
    "</get-configuration>"
);

/// Junos device reached over NETCONF.
pub struct JunosDevice {
    session: NetconfSession,
    closed: bool,
}

impl JunosDevice {
    /// Wraps a connected session and opens the dynamic database.
    pub async fn open(mut session: NetconfSession) -> HandlerResult<Self> {
        session
            .rpc(OPEN_DYNAMIC_RPC)
            .await?
            .into_result("open-configuration")?;
        debug!("Opened dynamic configuration database");
        Ok(Self {
            session,
            closed: false,
        })
    }

    async fn write_rpc(&mut self, body: &str, rpc: &str) -> HandlerResult<Result<(), String>> {
        match self.session.rpc(body).await?.into_result(rpc) {
            Ok(_) => Ok(Ok(())),
            Err(ScriptError::RpcRejected { message, .. }) => Ok(Err(message)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Device for JunosDevice {
    #[instrument(skip(self), fields(interface = %handle))]
    async fn interface_snapshot(
        &mut self,
        handle: &InterfaceHandle,
    ) -> HandlerResult<InterfaceSnapshot> {
        let rpc = "get-interface-information";
        let body = format!(
            "<get-interface-information format=\"json\"><interface-name>{}</interface-name></get-interface-information>",
            xml::escape(handle.as_str())
        );
        let reply = self.session.rpc(&body).await?.into_result(rpc)?;
        let snapshot = InterfaceSnapshot::from_json(handle, &reply_json(rpc, &reply)?)?;
        debug!(?snapshot, "Interface snapshot");
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn autonomous_system(&mut self) -> HandlerResult<Option<String>> {
        let rpc = "get-configuration";
        let reply = self.session.rpc(GET_ASN_RPC).await?.into_result(rpc)?;
        // An empty configuration comes back without a JSON body.
        if !reply.body().contains('{') {
            return Ok(None);
        }
        Ok(autonomous_system_from_json(&reply_json(rpc, &reply)?))
    }

    #[instrument(skip(self, fragment), fields(community = %fragment.community_name()))]
    async fn load_replace(&mut self, fragment: &ConfigFragment) -> HandlerResult<()> {
        let body = format!(
            "<load-configuration action=\"replace\" format=\"xml\">{}</load-configuration>",
            fragment.to_xml()
        );
        self.write_rpc(&body, "load-configuration")
            .await?
            .map_err(|message| HandlerError::LoadRejected { message })
    }

    #[instrument(skip(self))]
    async fn commit(&mut self) -> HandlerResult<()> {
        self.write_rpc(COMMIT_RPC, "commit-configuration")
            .await?
            .map_err(|message| HandlerError::CommitRejected { message })
    }

    #[instrument(skip(self))]
    async fn unlock(&mut self) -> HandlerResult<()> {
        self.write_rpc(UNLOCK_RPC, "unlock-configuration")
            .await?
            .map_err(|message| HandlerError::UnlockFailed { message })
    }

    async fn close(&mut self) -> HandlerResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.session.rpc(CLOSE_CONFIGURATION_RPC).await {
            Ok(reply) => {
                if let Err(e) = reply.into_result("close-configuration") {
                    warn!(error = %e, "close-configuration rejected");
                }
            }
            Err(e) => warn!(error = %e, "close-configuration failed"),
        }
        self.session.close().await?;
        Ok(())
    }
}

/// Spawns a NETCONF session per run.
#[derive(Debug, Clone, Default)]
pub struct JunosConnector {
    session: SessionConfig,
}

impl JunosConnector {
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Connector for JunosConnector {
    type Device = JunosDevice;

    #[instrument(skip(self), fields(program = %self.session.program))]
    async fn connect(&self) -> HandlerResult<JunosDevice> {
        let session = NetconfSession::connect(&self.session).await?;
        JunosDevice::open(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::CommunityDescriptor;
    use crate::context::AsNumber;
    use crate::event::extract_interface;
    use crate::speed::BandwidthValue;
    use serde_json::json;
    use std::time::Duration;

    fn ae3() -> InterfaceHandle {
        extract_interface("EVENT <Bandwidth> ae3 index 7").unwrap()
    }

    fn interface_reply(unit0: Value, ifd: Value) -> Value {
        json!({
            "interface-information": [{
                "attributes": {"xmlns": "http://xml.juniper.net/junos/19.4R0/junos-interface"},
                "physical-interface": [{
                    "name": [{"data": "ae3"}],
                    "speed": [{"data": "20Gbps"}],
                    "description": ifd,
                    "logical-interface": [
                        {"name": [{"data": "ae3.0"}], "description": unit0},
                        {"name": [{"data": "ae3.100"}], "description": [{"data": "vlan 100"}]}
                    ]
                }]
            }]
        })
    }

    #[test]
    fn test_snapshot_unit0_and_ifd() {
        let reply = interface_reply(json!([{"data": "prod-uplink-1"}]), json!([{"data": "lag to core"}]));
        let snapshot = InterfaceSnapshot::from_json(&ae3(), &reply).unwrap();
        assert_eq!(snapshot.name, "ae3");
        assert_eq!(snapshot.raw_speed.as_deref(), Some("20Gbps"));
        assert_eq!(snapshot.unit0_descriptions, vec!["prod-uplink-1"]);
        assert_eq!(snapshot.ifd_descriptions, vec!["lag to core"]);
    }

    #[test]
    fn test_snapshot_without_descriptions() {
        let reply = interface_reply(Value::Null, json!([{"data": "  "}]));
        let snapshot = InterfaceSnapshot::from_json(&ae3(), &reply).unwrap();
        assert!(snapshot.unit0_descriptions.is_empty());
        assert!(snapshot.ifd_descriptions.is_empty());
    }

    #[test]
    fn test_snapshot_multiple_unit0_descriptions() {
        let reply = interface_reply(
            json!([{"data": "prod-a"}, {"data": "prod-b"}]),
            json!([{"data": "lag"}]),
        );
        let snapshot = InterfaceSnapshot::from_json(&ae3(), &reply).unwrap();
        assert_eq!(snapshot.unit0_descriptions.len(), 2);
    }

    #[test]
    fn test_snapshot_ignores_other_interfaces() {
        let reply = json!({
            "interface-information": [{
                "physical-interface": [{
                    "name": [{"data": "ae30"}],
                    "speed": [{"data": "100Gbps"}],
                    "description": [{"data": "not me"}]
                }]
            }]
        });
        let snapshot = InterfaceSnapshot::from_json(&ae3(), &reply).unwrap();
        assert_eq!(snapshot.raw_speed, None);
        assert!(snapshot.ifd_descriptions.is_empty());
    }

    #[test]
    fn test_snapshot_malformed() {
        assert!(matches!(
            InterfaceSnapshot::from_json(&ae3(), &json!({"configuration": {}})),
            Err(HandlerError::MalformedReply { .. })
        ));
    }

    #[test]
    fn test_autonomous_system_from_json() {
        let reply = json!({"configuration": {"routing-options": {"autonomous-system": {"as-number": "65010"}}}});
        assert_eq!(autonomous_system_from_json(&reply).as_deref(), Some("65010"));

        let reply = json!({"configuration": {"routing-options": {"autonomous-system": {"as-number": 4200000001u64}}}});
        assert_eq!(autonomous_system_from_json(&reply).as_deref(), Some("4200000001"));

        let reply = json!({"configuration": {"routing-options": {"static": {}}}});
        assert_eq!(autonomous_system_from_json(&reply), None);
    }

    #[test]
    fn test_reply_json() {
        let reply = RpcReply::new(
            "<rpc-reply>\n{\"configuration\" : {}}\n<!-- user root, last commit -->\n</rpc-reply>",
        );
        assert_eq!(reply_json("get-configuration", &reply).unwrap(), json!({"configuration": {}}));

        let reply = RpcReply::new("<rpc-reply><ok/></rpc-reply>");
        assert!(matches!(
            reply_json("get-configuration", &reply),
            Err(HandlerError::MalformedReply { .. })
        ));
    }

    const PEER_SCRIPT: &str = r#"
printf '%s]]>]]>' '<hello><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities></hello>'
while IFS= read -r line; do
  case "$line" in
    *close-session*) printf '%s]]>]]>' '<rpc-reply><ok/></rpc-reply>'; exit 0;;
    *get-interface-information*) printf '%s]]>]]>' '<rpc-reply>{"interface-information":[{"physical-interface":[{"name":[{"data":"ae3"}],"speed":[{"data":"10Gbps"}],"logical-interface":[{"name":[{"data":"ae3.0"}],"description":[{"data":"prod-uplink-1"}]}]}]}]}</rpc-reply>';;
    *get-configuration*) printf '%s]]>]]>' '<rpc-reply>{"configuration":{"routing-options":{"autonomous-system":{"as-number":"65010"}}}}</rpc-reply>';;
    *commit-configuration*) printf '%s]]>]]>' '<rpc-reply><rpc-error><error-severity>error</error-severity><error-message>configuration database locked by: admin</error-message></rpc-error></rpc-reply>';;
    *"<rpc "*) printf '%s]]>]]>' '<rpc-reply><ok/></rpc-reply>';;
  esac
done
"#;

    fn peer_connector() -> JunosConnector {
        JunosConnector::new(SessionConfig {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), PEER_SCRIPT.to_string()],
            rpc_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn test_junos_device_against_scripted_peer() {
        let mut device = peer_connector().connect().await.unwrap();

        let snapshot = device.interface_snapshot(&ae3()).await.unwrap();
        assert_eq!(snapshot.raw_speed.as_deref(), Some("10Gbps"));
        assert_eq!(snapshot.unit0_descriptions, vec!["prod-uplink-1"]);

        assert_eq!(device.autonomous_system().await.unwrap().as_deref(), Some("65010"));

        let fragment = CommunityDescriptor::build(
            "bw_community_",
            &ae3(),
            &AsNumber::parse("65010").unwrap(),
            BandwidthValue::from_speed("10Gbps"),
        )
        .to_fragment();
        device.load_replace(&fragment).await.unwrap();

        match device.commit().await {
            Err(e @ HandlerError::CommitRejected { .. }) => {
                assert!(e.is_contention());
                assert!(e.to_string().contains("locked by: admin"));
            }
            other => panic!("expected CommitRejected, got {:?}", other),
        }

        device.unlock().await.unwrap();
        device.close().await.unwrap();
        device.close().await.unwrap();
    }
}
